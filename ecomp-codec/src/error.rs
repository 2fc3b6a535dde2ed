use std::string::FromUtf8Error;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EcompError {
    #[error("row {row} has length {got}, expected {expected}")]
    RowLengthMismatch {
        row: usize,
        expected: usize,
        got: usize,
    },
    #[error("non-ascii symbol 0x{symbol:02x} at row {row}, column {column}")]
    NonAsciiSymbol {
        row: usize,
        column: usize,
        symbol: u8,
    },
    #[error("duplicate sequence id {0:?}")]
    DuplicateSequenceId(String),
    #[error("sequence count mismatch, expected {expected}, got {got}")]
    SequenceCountMismatch { expected: usize, got: usize },
    #[error("invalid sequence permutation: {0}")]
    InvalidPermutation(&'static str),
    #[error("invalid {0} magic")]
    InvalidMagic(&'static str),
    #[error("unsupported {what} version {version}")]
    UnsupportedVersion { what: &'static str, version: u8 },
    #[error("payload length {expected} does not match archive size {got}")]
    PayloadLengthMismatch { expected: u64, got: u64 },
    #[error("truncated {0}")]
    Truncated(&'static str),
    #[error("unexpected trailing bytes after {0}")]
    TrailingData(&'static str),
    #[error("unknown {kind} mode 0x{mode:02x}")]
    UnknownMode { kind: &'static str, mode: u8 },
    #[error("varint exceeds 64 bits")]
    VarintOverflow,
    #[error("invalid huffman code lengths: {0}")]
    InvalidCodeLengths(&'static str),
    #[error("invalid consensus model for 0x{consensus:02x}: {detail}")]
    InvalidModel { consensus: u8, detail: &'static str },
    #[error("missing consensus model for 0x{0:02x}")]
    MissingConsensusModel(u8),
    #[error("residue outside local alphabet of consensus 0x{0:02x}")]
    ResidueOutsideAlphabet(u8),
    #[error("dictionary id {id} out of range, dictionary has {size} entries")]
    DictionaryIdOutOfRange { id: u8, size: usize },
    #[error("row index {row} out of range, alignment has {rows} rows")]
    RowOutOfRange { row: u32, rows: usize },
    #[error("deviation count mismatch, expected {expected}, got {got}")]
    DeviationCountMismatch { expected: usize, got: usize },
    #[error("invalid block {block}: {detail}")]
    InvalidBlock { block: usize, detail: &'static str },
    #[error("block too large: {0}")]
    BlockTooLarge(&'static str),
    #[error("alignment length mismatch, expected {expected}, got {got}")]
    AlignmentLengthMismatch { expected: usize, got: usize },
    #[error("checksum mismatch, expected {expected}, got {got}")]
    ChecksumMismatch { expected: String, got: String },
    #[error("unsupported payload encoding {0:?}")]
    UnsupportedPayloadEncoding(String),
    #[error("unsupported fallback {0:?}")]
    UnsupportedFallback(String),
    #[error("fallback payload is not a valid gzip stream")]
    FallbackInconsistency,
    #[error("corrupt {encoding} payload: {detail}")]
    CorruptPayload {
        encoding: &'static str,
        detail: String,
    },
    #[error(transparent)]
    InvalidString(#[from] FromUtf8Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    IO(#[from] std::io::Error),
}
