mod identifier;
mod permutation;

pub use identifier::IdentifierChunk;
pub use permutation::PermutationChunk;

pub(crate) use permutation::validate_permutation;
