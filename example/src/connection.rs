use std::time::Duration;
use rivet::{Config, Connection, Result};

pub async fn main() -> Result<()> {
    let conn = Connection::connect_env().await?;
    conn.query("SELECT 1", [0i32; 0]).await?.count()?;
    conn.shutdown().await?;

    let config = Config::from_env()
        .fetch_size(50)
        .timeout(Duration::from_secs(5));
    let conn = Connection::connect_with(config).await?;
    let rows = conn.query("SELECT 1", [0i32; 0]).await?.rows()?.fetch_all().await?;
    assert_eq!(rows.len(), 1);
    conn.shutdown().await?;

    Ok(())
}
