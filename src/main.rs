use dlms2json::{config::SerialParity, Config, DlmsMeter, MeasurementKind, TickOutcome};
use log::{debug, error, info};
use std::collections::VecDeque;
use std::{env, time::Duration};
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tokio_serial::SerialPortBuilderExt;

fn open_port(config: &Config) -> tokio_serial::Result<tokio_serial::SerialStream> {
    let serial = &config.serial;

    let parity = match serial.parity {
        SerialParity::None => tokio_serial::Parity::None,
        SerialParity::Odd => tokio_serial::Parity::Odd,
        SerialParity::Even => tokio_serial::Parity::Even,
    };
    let data_bits = match serial.data_bits {
        5 => tokio_serial::DataBits::Five,
        6 => tokio_serial::DataBits::Six,
        7 => tokio_serial::DataBits::Seven,
        _ => tokio_serial::DataBits::Eight,
    };
    let stop_bits = match serial.stop_bits {
        2 => tokio_serial::StopBits::Two,
        _ => tokio_serial::StopBits::One,
    };

    return tokio_serial::new(&serial.port, serial.baud_rate)
        .data_bits(data_bits)
        .stop_bits(stop_bits)
        .parity(parity)
        .open_native_async();
}

fn register_log_sinks(meter: &mut DlmsMeter) {
    for kind in MeasurementKind::ALL {
        if kind.is_text() {
            meter.sinks_mut().register_text(kind, move |value: &str| {
                debug!("{}: {value}", kind.name());
            });
        } else {
            let unit = kind.unit().unwrap_or("");
            let decimals = kind.accuracy_decimals() as usize;
            meter.sinks_mut().register_numeric(kind, move |value: f64| {
                debug!("{}: {value:.decimals$} {unit}", kind.name());
            });
        }
    }
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Initialize logging
    let default_filter = env::var("DLMS_LOG_LEVEL").unwrap_or("info".to_string());
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(default_filter));

    let config_path = env::args().nth(1);
    let config = match Config::load(config_path.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    let mut meter = match DlmsMeter::new(&config.meter) {
        Ok(m) => m,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };
    register_log_sinks(&mut meter);
    meter.dump_config();

    let mut port = open_port(&config)?;
    info!("{}: listening on {} with {} baud", meter.name(), config.serial.port, config.serial.baud_rate);

    /* The reader task only moves bytes, decoding happens on the tick below */
    let (tx, mut rx) = mpsc::channel::<Vec<u8>>(64);
    let reader = tokio::spawn(async move {
        let mut buf = [0u8; 256];
        loop {
            match port.read(&mut buf).await {
                Ok(0) => {
                    error!("Serial port closed");
                    break;
                }
                Ok(n) => {
                    if tx.send(buf[..n].to_vec()).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    error!("Error reading serial port: {e:?}");
                    break;
                }
            }
        }
    });

    let mut queue: VecDeque<u8> = VecDeque::with_capacity(config.meter.buffer_size);
    let mut interval = tokio::time::interval(Duration::from_millis(config.serial.poll_interval_ms));

    loop {
        interval.tick().await;

        while let Ok(chunk) = rx.try_recv() {
            queue.extend(chunk);
        }

        match meter.tick(&mut queue, std::time::Instant::now()) {
            TickOutcome::Decoded(reading) => match serde_json::to_string(&reading) {
                Ok(json) => println!("{json}"),
                Err(e) => error!("Unable to serialize reading: {e:?}"),
            },
            TickOutcome::Rejected(_) | TickOutcome::Pending => {}
        }

        if reader.is_finished() && rx.is_empty() {
            break;
        }
    }

    info!("Serial reader stopped, exiting");
    Ok(())
}
