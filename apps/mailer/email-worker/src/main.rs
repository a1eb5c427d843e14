//! Email Worker - Entry Point
//!
//! Lambda function that dispatches email requests delivered by SQS.

#[tokio::main]
async fn main() -> eyre::Result<()> {
    email_worker::run().await
}
