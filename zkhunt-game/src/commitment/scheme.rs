/// Trait for commitment schemes
pub trait CommitmentScheme {
    type Opening;
    type Commitment: PartialEq;

    fn commit(opening: &Self::Opening) -> Self::Commitment;

    fn verify(commitment: &Self::Commitment, opening: &Self::Opening) -> bool {
        Self::commit(opening) == *commitment
    }
}
