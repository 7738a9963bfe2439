use borgcord::backend::ReplyProxyClient;
use borgcord::commands::builtin;
use borgcord::config::Settings;
use borgcord::dispatch::MessageDispatcher;
use borgcord::platform::{IncomingMessage, SerenityPlatform};
use borgcord::{Data, Error};
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let settings = Settings::from_env()?;
    debug!("Loaded settings: {:?}", settings);
    settings.require_multiplex()?;

    let discord_token = match settings.token() {
        Ok(token) => token.to_string(),
        Err(e) => {
            error!("No Token. Set one in your conf file. ({})", e);
            return Ok(());
        }
    };

    let backend = ReplyProxyClient::new(&settings);
    let registry = builtin::registry(&settings, backend.http_client());
    let dispatcher = Arc::new(MessageDispatcher::new(&settings, backend, registry));
    let setup_dispatcher = dispatcher.clone();

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions::<Data, Error> {
            commands: vec![],
            event_handler: |ctx, event, _framework, data| {
                Box::pin(async move {
                    match event {
                        serenity::FullEvent::Ready { data_about_bot } => {
                            info!(
                                "Logged in as {} ({})",
                                data_about_bot.user.name, data_about_bot.user.id
                            );
                        }
                        serenity::FullEvent::Message { new_message } => {
                            let platform = SerenityPlatform::new(ctx);
                            let incoming = IncomingMessage::from(new_message);
                            match data.dispatcher.dispatch(&platform, &incoming).await {
                                Ok(outcome) => debug!("Message {} -> {:?}", new_message.id, outcome),
                                Err(e) => error!("Dropped message {}: {}", new_message.id, e),
                            }
                        }
                        _ => {}
                    }
                    Ok(())
                })
            },
            ..Default::default()
        })
        .setup(move |_ctx, _ready, _framework| {
            Box::pin(async move {
                info!("Bot is ready!");
                Ok(Data {
                    dispatcher: setup_dispatcher,
                })
            })
        })
        .build();

    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::MESSAGE_CONTENT
        | serenity::GatewayIntents::GUILD_MEMBERS;

    let mut client = serenity::ClientBuilder::new(&discord_token, intents)
        .framework(framework)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create client: {}", e))?;

    // Graceful shutdown: close all shards on SIGTERM or Ctrl+C.
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {}
                        _ = sigterm.recv() => {}
                    }
                }
                Err(_) => {
                    tokio::signal::ctrl_c().await.ok();
                }
            }
        }
        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c().await.ok();
        }
        info!("Shutdown signal received, stopping Discord client...");
        shard_manager.shutdown_all().await;
    });

    info!("Starting bot...");
    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }

    dispatcher.backend().close();
    info!("Bot stopped");
    Ok(())
}
