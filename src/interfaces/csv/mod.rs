pub mod availability_writer;
pub mod request_reader;
