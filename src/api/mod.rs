// Report payloads consumed by external viewers.

pub mod dto;
