use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct MessageRequest {
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub email: String,
    pub message: String,
}
