/// Category of a collaborator error. Lets the pipeline decide whether a
/// failure aborts the run, stops reading, or only drops one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid configuration — permanent, fail at startup.
    Config,
    /// Endpoint unreachable or handshake failed — fatal before the run starts.
    Connection,
    /// One source document could not be turned into a record — skip it.
    Decode,
    /// Source cursor broke mid-stream — stop reading, drain what is queued.
    Read,
    /// One record could not be persisted — log and move on.
    Write,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Config => f.write_str("config"),
            ErrorKind::Connection => f.write_str("connection"),
            ErrorKind::Decode => f.write_str("decode"),
            ErrorKind::Read => f.write_str("read"),
            ErrorKind::Write => f.write_str("write"),
        }
    }
}

/// Unified error type for source and sink collaborators.
///
/// Carries an `ErrorKind` for categorization and a human-readable message.
/// Driver crates convert into it with the kind that matches the call site,
/// so `?` stays ergonomic inside implementations.
#[derive(Clone)]
pub struct FerryError {
    kind: ErrorKind,
    message: String,
}

impl FerryError {
    pub fn new(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self { kind, message: msg.into() }
    }

    /// Configuration error — permanent, fail at startup.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, msg)
    }

    /// Endpoint unreachable.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Connection, msg)
    }

    /// Malformed source item.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Decode, msg)
    }

    /// Broken source cursor.
    pub fn read(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Read, msg)
    }

    /// Failed insert.
    pub fn write(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Write, msg)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Re-tag the error, keeping the message. Drivers report one error type
    /// for every call; the caller knows which stage it came from.
    pub fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = kind;
        self
    }
}

impl std::fmt::Debug for FerryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl std::fmt::Display for FerryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for FerryError {}

impl From<std::io::Error> for FerryError {
    fn from(e: std::io::Error) -> Self { Self::connection(e.to_string()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_includes_kind() {
        let e = FerryError::write("duplicate key value violates unique constraint");
        assert_eq!(format!("{e:?}"), "[write] duplicate key value violates unique constraint");
        assert_eq!(e.to_string(), "duplicate key value violates unique constraint");
    }

    #[test]
    fn with_kind_keeps_message() {
        let e = FerryError::connection("socket closed").with_kind(ErrorKind::Read);
        assert_eq!(e.kind(), ErrorKind::Read);
        assert_eq!(e.message(), "socket closed");
    }
}
