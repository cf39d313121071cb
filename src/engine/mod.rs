pub mod client;
pub mod logging;
pub mod stream;

#[cfg(test)]
pub mod mock_client;
