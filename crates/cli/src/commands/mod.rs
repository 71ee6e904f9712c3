pub mod chat;
pub mod doctor;
pub mod status;
pub mod tools_cmd;
