//! Jobdesk Backend - binary entry point
//! Delegates to the library for all app logic.

#[tokio::main]
async fn main() {
    jobdesk_backend::run().await;
}
