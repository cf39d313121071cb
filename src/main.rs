use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let config = rudder::config::Config::load()?;
    config.validate()?;

    let mut app = rudder::app::App::new(config)?;
    app.run().await?;

    Ok(())
}
