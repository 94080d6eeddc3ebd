/// Bluetooth Low Energy device link: discovery, GATT subscription, notification forwarding
use std::future::Future;

use futures_util::{pin_mut, Stream, StreamExt};
use log::{debug, error, info, warn};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};

use crate::config::LinkConfig;
use crate::error::{Result, TelemetryError};
use crate::telemetry::{LinkEvent, LinkEventKind, LinkId};

// How long a closing link gets to disconnect before its task is aborted
const CLOSE_GRACE_SECS: u64 = 2;

/// Running connect attempt for one peripheral
///
/// The background task reports everything it does as [`LinkEvent`]s tagged
/// with this attempt's id. Closing the link asks the task to disconnect the
/// device and falls back to aborting it. The close request is honoured at
/// every setup step, not only once notifications are flowing.
pub struct DeviceLink {
    id: LinkId,
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl DeviceLink {
    /// Start a connect attempt in the background
    ///
    /// `previous` is closed first, inside the new task, so the caller never
    /// waits and the old attempt cannot disconnect the device from under the
    /// new one.
    pub fn spawn(
        config: LinkConfig,
        id: LinkId,
        events: mpsc::Sender<LinkEvent>,
        previous: Option<DeviceLink>,
    ) -> Self {
        let (stop, mut stop_rx) = oneshot::channel();
        let task = tokio::spawn(async move {
            if await_previous(previous, &mut stop_rx).await {
                run_link(config, id, events, stop_rx).await;
            }
        });
        DeviceLink { id, stop, task }
    }

    pub fn id(&self) -> LinkId {
        self.id
    }

    pub async fn close(self) {
        let _ = self.stop.send(());
        let mut task = self.task;
        if timeout(Duration::from_secs(CLOSE_GRACE_SECS), &mut task)
            .await
            .is_err()
        {
            warn!("Link {} did not stop in time, aborting", self.id);
            task.abort();
        }
    }
}

/// Wait for an earlier attempt to let go of the device; false if closed meanwhile
async fn await_previous(previous: Option<DeviceLink>, stop: &mut oneshot::Receiver<()>) -> bool {
    match previous {
        Some(previous) => {
            debug!("Waiting for link {} to close", previous.id);
            unless_stopped(stop, previous.close()).await.is_some()
        }
        None => true,
    }
}

/// Run one step of the link, `None` if the link was closed first
async fn unless_stopped<F, T>(stop: &mut oneshot::Receiver<()>, step: F) -> Option<T>
where
    F: Future<Output = T>,
{
    tokio::select! {
        output = step => Some(output),
        _ = stop => None,
    }
}

async fn run_link(
    config: LinkConfig,
    id: LinkId,
    events: mpsc::Sender<LinkEvent>,
    mut stop: oneshot::Receiver<()>,
) {
    if let Err(e) = subscribe_and_forward(&config, id, &events, &mut stop).await {
        error!("Link {} failed: {}", id, e);
        let reason = match e {
            TelemetryError::Transport(reason) => reason,
            other => other.to_string(),
        };
        let _ = events
            .send(LinkEvent::new(id, LinkEventKind::Failed(reason)))
            .await;
    }
}

/// Connect to the configured device and forward its notifications until the
/// stream ends or the link is closed
async fn subscribe_and_forward(
    config: &LinkConfig,
    id: LinkId,
    events: &mpsc::Sender<LinkEvent>,
    stop: &mut oneshot::Receiver<()>,
) -> Result<()> {
    let adapter = match unless_stopped(stop, open_adapter()).await {
        Some(adapter) => adapter?,
        None => return Ok(()),
    };
    let device = match unless_stopped(stop, find_device(&adapter, config)).await {
        Some(device) => device?,
        None => {
            debug!("Link {} closed while scanning", id);
            return Ok(());
        }
    };

    if !device.is_connected().await? {
        info!("Connecting to {} ({})", config.device_name, device.address());
        if unless_stopped(stop, device.connect()).await.transpose()?.is_none() {
            debug!("Link {} closed while connecting", id);
            disconnect_quietly(&device, config).await;
            return Ok(());
        }
    }

    let characteristic = match unless_stopped(stop, find_characteristic(&device, config)).await {
        Some(characteristic) => characteristic?,
        None => {
            disconnect_quietly(&device, config).await;
            return Ok(());
        }
    };
    let notifications = match unless_stopped(stop, characteristic.notify()).await {
        Some(notifications) => notifications?,
        None => {
            disconnect_quietly(&device, config).await;
            return Ok(());
        }
    };
    pin_mut!(notifications);

    if events
        .send(LinkEvent::new(id, LinkEventKind::Established))
        .await
        .is_err()
    {
        // Nobody is listening anymore
        return Ok(());
    }
    info!("Subscribed to notifications from {}", config.device_name);

    loop {
        tokio::select! {
            value = notifications.next() => match value {
                Some(bytes) => {
                    let event = LinkEvent::new(id, LinkEventKind::Notification(bytes));
                    if events.send(event).await.is_err() {
                        break;
                    }
                }
                None => {
                    let reason = format!("{} stopped sending notifications", config.device_name);
                    let _ = events.send(LinkEvent::new(id, LinkEventKind::Lost(reason))).await;
                    return Ok(());
                }
            },
            _ = &mut *stop => {
                debug!("Link {} closed by user", id);
                break;
            }
        }
    }

    disconnect_quietly(&device, config).await;
    Ok(())
}

async fn disconnect_quietly(device: &bluer::Device, config: &LinkConfig) {
    if let Err(e) = device.disconnect().await {
        warn!("Failed to disconnect {}: {}", config.device_name, e);
    }
}

async fn open_adapter() -> Result<bluer::Adapter> {
    // Initialize Bluetooth session
    let session = bluer::Session::new().await?;
    let adapter = session.default_adapter().await?;

    // Ensure Bluetooth adapter is powered on
    adapter.set_powered(true).await?;

    // Configure discovery filter for Low Energy devices only
    let filter = bluer::DiscoveryFilter {
        transport: bluer::DiscoveryTransport::Le,
        ..Default::default()
    };
    if let Err(e) = adapter.set_discovery_filter(filter).await {
        warn!("Failed to set discovery filter: {}", e);
    }

    Ok(adapter)
}

/// Discover devices until one advertises the configured name
async fn find_device(adapter: &bluer::Adapter, config: &LinkConfig) -> Result<bluer::Device> {
    info!(
        "Scanning for '{}' (up to {} s)",
        config.device_name, config.scan_timeout_secs
    );
    let discovery = adapter.discover_devices().await?;
    pin_mut!(discovery);

    let search = scan_for_name(adapter, &mut discovery, &config.device_name);
    match timeout(Duration::from_secs(config.scan_timeout_secs), search).await {
        Ok(found) => found,
        Err(_) => Err(TelemetryError::Transport(format!(
            "Device {} not found",
            config.device_name
        ))),
    }
}

async fn scan_for_name<S>(
    adapter: &bluer::Adapter,
    discovery: &mut S,
    name: &str,
) -> Result<bluer::Device>
where
    S: Stream<Item = bluer::AdapterEvent> + Unpin,
{
    // Devices BlueZ already knows about do not show up as new discovery events
    for addr in adapter.device_addresses().await? {
        if let Some(device) = named_device(adapter, addr, name).await {
            return Ok(device);
        }
    }
    while let Some(event) = discovery.next().await {
        if let bluer::AdapterEvent::DeviceAdded(addr) = event {
            if let Some(device) = named_device(adapter, addr, name).await {
                return Ok(device);
            }
        }
    }
    Err(TelemetryError::Transport("Discovery stream ended".to_string()))
}

async fn named_device(
    adapter: &bluer::Adapter,
    addr: bluer::Address,
    name: &str,
) -> Option<bluer::Device> {
    let device = adapter.device(addr).ok()?;
    match device.name().await {
        Ok(Some(found)) if found == name => {
            debug!("Found {} at {}", name, addr);
            Some(device)
        }
        Ok(_) => None,
        Err(e) => {
            debug!("Failed to read name of {}: {}", addr, e);
            None
        }
    }
}

async fn find_characteristic(
    device: &bluer::Device,
    config: &LinkConfig,
) -> Result<bluer::gatt::remote::Characteristic> {
    for service in device.services().await? {
        if service.uuid().await? != config.service_uuid {
            continue;
        }
        for characteristic in service.characteristics().await? {
            if characteristic.uuid().await? == config.characteristic_uuid {
                return Ok(characteristic);
            }
        }
        return Err(TelemetryError::Transport(format!(
            "Characteristic {} not found in service {}",
            config.characteristic_uuid, config.service_uuid
        )));
    }
    Err(TelemetryError::Transport(format!(
        "Service {} not found on {}",
        config.service_uuid, config.device_name
    )))
}

/// Link whose task only waits to be told to stop, then records it
#[cfg(test)]
pub(crate) fn idle_link(
    id: LinkId,
) -> (DeviceLink, std::sync::Arc<std::sync::atomic::AtomicBool>) {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    let stopped = Arc::new(AtomicBool::new(false));
    let flag = stopped.clone();
    let (stop, stop_rx) = oneshot::channel();
    let task = tokio::spawn(async move {
        let _ = stop_rx.await;
        flag.store(true, Ordering::SeqCst);
    });
    (DeviceLink { id, stop, task }, stopped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_close_stops_the_task() {
        let (link, stopped) = idle_link(1);
        link.close().await;
        assert!(stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_step_abandoned_once_closed() {
        let (stop, mut stop_rx) = oneshot::channel();
        stop.send(()).unwrap();
        // Stands in for a scan that never finds the device
        let scan = std::future::pending::<Result<()>>();
        assert!(unless_stopped(&mut stop_rx, scan).await.is_none());
    }

    #[tokio::test]
    async fn test_step_completes_while_open() {
        let (_stop, mut stop_rx) = oneshot::channel::<()>();
        let output = unless_stopped(&mut stop_rx, async { 7 }).await;
        assert_eq!(output, Some(7));
    }

    #[tokio::test]
    async fn test_new_attempt_waits_for_previous() {
        let (previous, stopped) = idle_link(1);
        let (_stop, mut stop_rx) = oneshot::channel::<()>();
        assert!(await_previous(Some(previous), &mut stop_rx).await);
        assert!(stopped.load(Ordering::SeqCst));
        assert!(await_previous(None, &mut stop_rx).await);
    }
}
