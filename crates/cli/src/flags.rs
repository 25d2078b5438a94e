use clap::ValueEnum;
use retrieval_vector_store::IndexBackend;

#[derive(Copy, Clone, ValueEnum)]
pub(crate) enum BackendFlag {
    Flat,
    Matrix,
}

impl BackendFlag {
    pub(crate) const fn as_domain(self) -> IndexBackend {
        match self {
            BackendFlag::Flat => IndexBackend::Flat,
            BackendFlag::Matrix => IndexBackend::Matrix,
        }
    }
}

/// Parse `key=value`; the value may be empty or contain further `=`
pub(crate) fn parse_key_val(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}
