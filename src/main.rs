use anyhow::Context;
use libra_kernel::settings::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().with_context(|| "failed to load LIBRA settings")?;
    libra_telemetry::init(&settings.telemetry)?;

    libra_app::run(settings, None).await
}
