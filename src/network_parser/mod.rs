pub mod network;
pub mod page_parser;
