pub type FramepipeResult<T> = Result<T, FramepipeError>;

#[derive(thiserror::Error, Debug)]
pub enum FramepipeError {
    #[error("decode error: {0}")]
    Decode(String),

    #[error("encoder init error: {0}")]
    Init(String),

    #[error("geometry mismatch: {0}")]
    GeometryMismatch(String),

    #[error("pipe write error: {0}")]
    Write(String),

    #[error("stream not open: {0}")]
    NotOpen(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FramepipeError {
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn init(msg: impl Into<String>) -> Self {
        Self::Init(msg.into())
    }

    pub fn geometry_mismatch(msg: impl Into<String>) -> Self {
        Self::GeometryMismatch(msg.into())
    }

    pub fn write(msg: impl Into<String>) -> Self {
        Self::Write(msg.into())
    }

    pub fn not_open(msg: impl Into<String>) -> Self {
        Self::NotOpen(msg.into())
    }
}
