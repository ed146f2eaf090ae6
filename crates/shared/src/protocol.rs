use serde::{Deserialize, Serialize};

/// Body of `POST /chat/message`. Field names follow the backend's camelCase
/// JSON convention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageRequest {
    pub product_id: String,
    pub message: String,
    pub description: String,
    pub brand: String,
}

/// Acknowledgement body returned by delete-style endpoints
/// (`DELETE /products/{id}`, `DELETE /chat/clear/{productId}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationStatus {
    pub success: bool,
}
