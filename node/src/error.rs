use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("ledger error: {0}")]
    Ledger(#[from] estate_ledger::LedgerError),

    #[error("rent error: {0}")]
    Rent(#[from] estate_rent::RentError),

    #[error("governance error: {0}")]
    Governance(#[from] estate_governance::GovernanceError),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("state file error: {0}")]
    Persistence(String),
}
