use concordium_std::*;

#[derive(Debug, Clone, Serialize, SchemaType)]
pub struct InitParams {
    /// Auction registry to bid against.
    pub target: ContractAddress,
    /// How far above the observed highest bid the nested bid goes.
    pub top_up: Amount,
}
