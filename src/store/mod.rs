pub mod presence;
pub mod receipts;
pub mod rooms;
pub mod session;
