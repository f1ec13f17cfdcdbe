use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cpg_common::Chain;
use crypto_payment_engine::{
    db_types::ChainTransaction,
    ChainQueryError,
    ChainWatcher,
    PriceOracle,
    PriceOracleError,
};
use mockall::mock;
use rust_decimal::Decimal;

mock! {
    pub PriceFeed {}
    #[async_trait]
    impl PriceOracle for PriceFeed {
        async fn fetch_price(&self, asset: &str) -> Result<Decimal, PriceOracleError>;
    }
}

mock! {
    pub Explorer {}
    #[async_trait]
    impl ChainWatcher for Explorer {
        async fn find_matching(
            &self,
            chain: Chain,
            recipient: &str,
            since: DateTime<Utc>,
        ) -> Result<Vec<ChainTransaction>, ChainQueryError>;
    }
}
