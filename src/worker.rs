//! Background worker for the slow lookups the journey needs between steps.

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::{
    diagnosis::model::SavedVehicle,
    service::{GuestQuota, QuotaEndpoint, ServiceError, VehicleStore},
};

/// Commands sent from the UI to the worker.
#[derive(Debug)]
pub enum WorkerCmd {
    /// Ask the backend how many free diagnoses the guest has left.
    CheckQuota { visit: u64 },
    /// Fetch the caller's saved vehicles.
    LoadVehicles,
}

/// Events emitted by the worker for UI updates.
#[derive(Debug)]
pub enum WorkerEvent {
    /// Quota answer for the review visit that asked for it.
    QuotaChecked {
        visit: u64,
        outcome: Result<GuestQuota, ServiceError>,
    },
    /// Saved vehicle list loaded.
    VehiclesLoaded(Vec<SavedVehicle>),
    /// Informational log message.
    Log(String),
    /// User-visible error message.
    Error(String),
}

/// Main worker loop: handle commands sequentially until the UI hangs up.
pub async fn run(
    mut rx: mpsc::Receiver<WorkerCmd>,
    tx: mpsc::Sender<WorkerEvent>,
    quota: Arc<dyn QuotaEndpoint>,
    vehicles: Arc<dyn VehicleStore>,
) {
    tracing::info!("worker started");

    while let Some(cmd) = rx.recv().await {
        match cmd {
            WorkerCmd::CheckQuota { visit } => {
                tracing::info!("quota check for visit {visit}");
                let outcome = quota.guest_quota().await;
                if tx
                    .send(WorkerEvent::QuotaChecked { visit, outcome })
                    .await
                    .is_err()
                {
                    break;
                }
            }

            WorkerCmd::LoadVehicles => match vehicles.saved_vehicles().await {
                Ok(list) => {
                    tracing::info!("saved vehicles loaded: {}", list.len());
                    let _ = tx
                        .send(WorkerEvent::Log(format!("{} saved vehicles", list.len())))
                        .await;
                    let _ = tx.send(WorkerEvent::VehiclesLoaded(list)).await;
                }
                Err(e) => {
                    tracing::error!("vehicle load failed: {e}");
                    let _ = tx
                        .send(WorkerEvent::Error(format!("could not load vehicles: {e}")))
                        .await;
                }
            },
        }
    }
    tracing::info!("worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnosis::test_support::{FakeQuota, FakeVehicles, sample_vehicle};
    use pretty_assertions::assert_eq;

    fn spawn_worker(
        quota: FakeQuota,
        vehicles: FakeVehicles,
    ) -> (mpsc::Sender<WorkerCmd>, mpsc::Receiver<WorkerEvent>) {
        let (tx_cmd, rx_cmd) = mpsc::channel(8);
        let (tx_ev, rx_ev) = mpsc::channel(8);
        tokio::spawn(run(rx_cmd, tx_ev, Arc::new(quota), Arc::new(vehicles)));
        (tx_cmd, rx_ev)
    }

    #[tokio::test]
    async fn test_quota_answer_carries_visit() {
        let (tx, mut rx) = spawn_worker(FakeQuota::remaining(2), FakeVehicles(Ok(vec![])));
        tx.send(WorkerCmd::CheckQuota { visit: 7 }).await.unwrap();
        match rx.recv().await.unwrap() {
            WorkerEvent::QuotaChecked { visit, outcome } => {
                assert_eq!(visit, 7);
                assert_eq!(outcome.unwrap(), GuestQuota { remaining: 2 });
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_vehicle_failure_reported_as_error() {
        let (tx, mut rx) = spawn_worker(
            FakeQuota::remaining(0),
            FakeVehicles(Err("garage offline".into())),
        );
        tx.send(WorkerCmd::LoadVehicles).await.unwrap();
        match rx.recv().await.unwrap() {
            WorkerEvent::Error(msg) => assert!(msg.contains("garage offline")),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_vehicles_loaded() {
        let (tx, mut rx) = spawn_worker(
            FakeQuota::remaining(0),
            FakeVehicles(Ok(vec![sample_vehicle("v-1")])),
        );
        tx.send(WorkerCmd::LoadVehicles).await.unwrap();
        let mut loaded = None;
        while let Some(ev) = rx.recv().await {
            if let WorkerEvent::VehiclesLoaded(list) = ev {
                loaded = Some(list);
                break;
            }
        }
        assert_eq!(loaded.unwrap(), vec![sample_vehicle("v-1")]);
    }
}
