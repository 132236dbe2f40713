use std::sync::Arc;

use anyhow::Result;

use super::Lab;
use crate::fleet::{AggregatedResult, Fleet, Outcome, Progress};
use crate::models::Host;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Start,
    Stop,
    Restart,
}

impl Action {
    fn title(self) -> &'static str {
        match self {
            Action::Start => "Start containers",
            Action::Stop => "Stop containers",
            Action::Restart => "Restart containers",
        }
    }
}

impl Lab {
    pub async fn start(self: &Arc<Self>, fleet: &Fleet) -> AggregatedResult {
        self.containers_action(fleet, Action::Start).await
    }

    pub async fn stop(self: &Arc<Self>, fleet: &Fleet) -> AggregatedResult {
        self.containers_action(fleet, Action::Stop).await
    }

    pub async fn restart(self: &Arc<Self>, fleet: &Fleet) -> AggregatedResult {
        self.containers_action(fleet, Action::Restart).await
    }

    async fn containers_action(self: &Arc<Self>, fleet: &Fleet, action: Action) -> AggregatedResult {
        let lab = self.clone();
        fleet
            .run(action.title(), fleet.len() as u64, move |host, progress| {
                let lab = lab.clone();
                async move {
                    let outcome = lab.container_action(&host, action, &progress).await;
                    progress.advance(1);
                    outcome
                }
            })
            .await
    }

    async fn container_action(&self, host: &Host, action: Action, progress: &Progress) -> Result<Outcome> {
        let name = self.topology.container_name(host);
        let running = self.containers.is_running(&name).await?;

        match action {
            Action::Start if running => {
                progress.log(format!("{}: Container {} already running.", host, name));
                Ok(Outcome::Unchanged)
            }
            Action::Start => {
                self.containers.start(&name).await?;
                progress.log(format!("{}: Container {} started.", host, name));
                Ok(Outcome::Changed)
            }
            Action::Stop if !running => {
                progress.log(format!("{}: Container {} already stopped.", host, name));
                Ok(Outcome::Unchanged)
            }
            Action::Stop => {
                self.containers.stop(&name).await?;
                progress.log(format!("{}: Container {} stopped.", host, name));
                Ok(Outcome::Changed)
            }
            Action::Restart => {
                self.containers.restart(&name).await?;
                progress.log(format!("{}: Container {} restarted.", host, name));
                Ok(Outcome::Changed)
            }
        }
    }
}
