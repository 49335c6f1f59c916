use serde::Deserialize;

/// Query string of `GET /carts`
#[derive(Debug, Deserialize)]
pub struct CartQuery {
    pub email: Option<String>,
}
