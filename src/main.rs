mod config;
mod database;
mod models;
mod services;
mod utils;

use anyhow::Result;
use dotenvy::dotenv;
use tokio::signal;
use tracing::{error, info};

use config::environment::EnvironmentConfig;
use database::connection::mask_database_url;
use services::LeaveSweepService;

/// Daemon del núcleo de flota: conecta a PostgreSQL, corre las migraciones
/// y dispara el barrido de licencias vencidas en un intervalo fijo. Los
/// comandos (cambio de estado, ciclo de vida de viajes, asignaciones) los
/// invoca la capa HTTP externa a través de los services.
#[tokio::main]
async fn main() -> Result<()> {
    // Cargar variables de entorno
    dotenv().ok();

    // Configurar logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    info!("🚚 Fleet Tracker - núcleo de estado de flota");
    info!("============================================");

    let config = EnvironmentConfig::from_env();
    info!("Base de datos: {}", mask_database_url(&config.database_url));

    // Inicializar base de datos
    let pool = match database::create_pool(Some(&config.database_url)).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("❌ Error conectando a la base de datos: {}", e);
            return Err(anyhow::anyhow!("Error de base de datos: {}", e));
        }
    };

    database::run_migrations(&pool).await?;
    info!("✓ Migraciones aplicadas");

    let sweep = LeaveSweepService::new(pool.clone());
    let mut ticker =
        tokio::time::interval(std::time::Duration::from_secs(config.sweep_interval_secs));

    info!(
        "🔁 Barrido de licencias vencidas cada {} segundos",
        config.sweep_interval_secs
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match sweep.sweep_expired_leaves().await {
                    Ok(count) if count > 0 => {
                        info!("✓ Barrido completado: {} chofer(es) transicionados", count);
                    }
                    Ok(_) => {}
                    Err(e) => error!("❌ Error en el barrido de licencias: {}", e),
                }
            }
            _ = shutdown_signal() => {
                break;
            }
        }
    }

    info!("👋 Servicio terminado");
    Ok(())
}

/// Señal de apagado graceful
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("🛑 Señal Ctrl+C recibida, apagando servicio...");
        },
        _ = terminate => {
            info!("🛑 Señal de terminación recibida, apagando servicio...");
        },
    }
}
