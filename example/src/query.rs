#![allow(unused)]
use rivet::{
    Connection, FromPrototype, FromRow, Result, TypeMap,
    stream::StreamMode,
    types::Json,
};
use serde::Deserialize;

#[derive(Debug, FromRow)]
struct Item {
    id: i32,
    name: String,
}

#[derive(FromRow)]
struct ItemTuple(i32, String);

#[derive(Debug, FromPrototype)]
#[prototype(name = "POINT")]
struct Point {
    x: f64,
    y: f64,
}

#[derive(Debug, Deserialize)]
struct Meta {
    tags: Vec<String>,
}

pub async fn main() -> Result<()> {
    let conn = Connection::connect_env().await?;

    // Execute

    conn.query("CREATE TEMP TABLE item(id int, name varchar, data blob, meta json)", [0i32; 0])
        .await?
        .count()?;

    let mut binder = conn.binder();
    binder
        .bind(1)?
        .bind("Deez")?
        .bind_as(vec![7u8; 128 * 1024], rivet::types::ClientType::Blob)?;
    let inserted = conn
        .execute("INSERT INTO item(id, name, data) VALUES(?, ?, ?)", binder.finish())
        .await?
        .count()?;
    assert_eq!(inserted, 1);

    // Queries

    let items = conn
        .query("SELECT id, name FROM item", [0i32; 0])
        .await?
        .rows()?
        .fetch_all_as::<Item>()
        .await?;

    let mut rows = conn.query("SELECT id, name, data, meta FROM item WHERE id = ?", [1]).await?.rows()?;
    while rows.has_next().await? {
        let row = rows.next()?;
        let ItemTuple(id, name) = ItemTuple(row.try_get(0)?, row.try_get("NAME")?);

        if let Some(mut blob) = conn.open_blob(row.get("data")?, StreamMode::Seekable)? {
            let head = blob.get(0, 16).await?;
            let rest = blob.read_to_end().await?;
            tracing::info!(id, name = %name, head = head.len(), rest = rest.len(), "blob read");
        }

        let meta: Option<Json<Meta>> = row.try_get("meta")?;
        tracing::info!(id, tags = ?meta.map(|e|e.0.tags), "meta read");
    }

    // Structured types

    let mut types = TypeMap::<Point>::new();
    types.register_type::<Point>();

    let mut points = conn.query("SELECT p FROM shapes", [0i32; 0]).await?.rows()?;
    while points.has_next().await? {
        let point: Point = points.next()?.try_get(0)?;
        tracing::info!(?point, "point");
    }

    Ok(())
}
