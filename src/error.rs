use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("vertex count not found in PLY header")]
    PlyVertexCountNotFound,
    #[error("{0}")]
    PlyVertexCountParseFailed(#[from] std::num::ParseIntError),
    #[error("not a PLY file")]
    NotPly,
    #[error("PLY header not found")]
    PlyHeaderNotFound,
    #[error("unsupported PLY format: {0}")]
    PlyUnsupportedFormat(String),
    #[error("unsupported PLY property type {ty} for {name}")]
    PlyUnsupportedPropertyType { name: String, ty: String },
    #[error("missing required PLY property: {0}")]
    PlyMissingProperty(&'static str),
    #[error("not a NPY file")]
    NotNpy,
    #[error("invalid NPY header: {0}")]
    NpyHeaderInvalid(String),
    #[error("unsupported NPY dtype: {0}")]
    NpyUnsupportedDtype(String),
    #[error("fortran ordered NPY arrays are not supported")]
    NpyFortranOrder,
    #[error("array shape mismatch, expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    #[error("gaussian column {column} has {actual} rows, expected {expected}")]
    RowCountMismatch {
        column: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("cache miss: {0}")]
    CacheMiss(String),
    #[error("avatar {0} not found")]
    AvatarNotFound(usize),
    #[error("no avatar selected")]
    NoAvatarSelected,
}
