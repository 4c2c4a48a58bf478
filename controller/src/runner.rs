use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{mpsc, watch, Mutex},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tracing::{info, warn};

use fancontrol_common::{Actuator, CycleResult, FanController, Reporter, SensorFeed};

use crate::clock::monotonic_ms;

/// What the periodic task needs from a controller.
pub trait CycleDriver: Send + 'static {
    fn run_cycle(&mut self, now_ms: u64) -> Option<CycleResult>;
    fn pause(&mut self) -> bool;
    fn resume(&mut self) -> bool;
}

impl<F, A, R> CycleDriver for FanController<F, A, R>
where
    F: SensorFeed + Send + 'static,
    A: Actuator + Send + 'static,
    R: Reporter + Send + 'static,
{
    fn run_cycle(&mut self, now_ms: u64) -> Option<CycleResult> {
        FanController::run_cycle(self, now_ms)
    }

    fn pause(&mut self) -> bool {
        FanController::pause(self)
    }

    fn resume(&mut self) -> bool {
        FanController::resume(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopCommand {
    Run,
    Pause,
    Stop,
}

/// Handle to the periodic control task.
pub struct LoopHandle<C> {
    driver: Arc<Mutex<C>>,
    commands: watch::Sender<LoopCommand>,
    task: Mutex<Option<JoinHandle<()>>>,
}

pub fn spawn_control_loop<C: CycleDriver>(
    driver: Arc<Mutex<C>>,
    period: Duration,
    cycles_tx: mpsc::UnboundedSender<CycleResult>,
) -> LoopHandle<C> {
    let (commands, mut commands_rx) = watch::channel(LoopCommand::Run);
    let task_driver = Arc::clone(&driver);

    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut running = *commands_rx.borrow_and_update() == LoopCommand::Run;

        loop {
            tokio::select! {
                _ = interval.tick(), if running => {
                    let cycle = {
                        let mut driver = task_driver.lock().await;
                        driver.run_cycle(monotonic_ms())
                    };
                    if let Some(cycle) = cycle {
                        if cycles_tx.send(cycle).is_err() {
                            warn!("cycle listener dropped; results are no longer published");
                        }
                    }
                }
                changed = commands_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    match *commands_rx.borrow_and_update() {
                        LoopCommand::Run => {
                            if !running {
                                interval.reset();
                            }
                            running = true;
                        }
                        LoopCommand::Pause => running = false,
                        LoopCommand::Stop => break,
                    }
                }
            }
        }

        info!("control loop task stopped");
    });

    LoopHandle {
        driver,
        commands,
        task: Mutex::new(Some(task)),
    }
}

impl<C: CycleDriver> LoopHandle<C> {
    pub fn driver(&self) -> &Arc<Mutex<C>> {
        &self.driver
    }

    /// No cycle runs after this returns.
    pub async fn pause(&self) -> bool {
        let changed = self.driver.lock().await.pause();
        self.commands.send_replace(LoopCommand::Pause);
        changed
    }

    /// The first cycle after resuming fires one full period later.
    pub async fn resume(&self) -> bool {
        let changed = self.driver.lock().await.resume();
        self.commands.send_replace(LoopCommand::Run);
        changed
    }

    /// Lets an in-flight cycle finish, then waits for the task to exit.
    pub async fn shutdown(&self) {
        self.commands.send_replace(LoopCommand::Stop);
        let task = self.task.lock().await.take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                warn!("control loop task ended abnormally: {err}");
            }
        }
    }
}
