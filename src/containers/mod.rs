use anyhow::Result;
use async_trait::async_trait;

/// ContainerDriver controls the containers backing lab devices
#[async_trait]
pub trait ContainerDriver: Send + Sync {
    async fn exists(&self, name: &str) -> Result<bool>;

    async fn is_running(&self, name: &str) -> Result<bool>;

    async fn start(&self, name: &str) -> Result<()>;

    async fn stop(&self, name: &str) -> Result<()>;

    async fn restart(&self, name: &str) -> Result<()>;
}

/// DockerDriver talks to the local Docker daemon
pub struct DockerDriver {
    docker: bollard::Docker,
}

impl DockerDriver {
    pub fn connect() -> Result<Self> {
        let docker = bollard::Docker::connect_with_socket_defaults()
            .map_err(|e| anyhow::anyhow!("Docker not available: {}", e))?;
        Ok(Self { docker })
    }
}

#[async_trait]
impl ContainerDriver for DockerDriver {
    async fn exists(&self, name: &str) -> Result<bool> {
        match self.docker.inspect_container(name, None).await {
            Ok(_) => Ok(true),
            Err(bollard::errors::Error::DockerResponseServerError { status_code: 404, .. }) => Ok(false),
            Err(e) => Err(anyhow::anyhow!("Failed to inspect container {}: {}", name, e)),
        }
    }

    async fn is_running(&self, name: &str) -> Result<bool> {
        let inspect = self
            .docker
            .inspect_container(name, None)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to inspect container {}: {}", name, e))?;
        Ok(inspect
            .state
            .and_then(|s| s.running)
            .unwrap_or(false))
    }

    async fn start(&self, name: &str) -> Result<()> {
        self.docker
            .start_container::<String>(name, None)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to start container {}: {}", name, e))
    }

    async fn stop(&self, name: &str) -> Result<()> {
        let options = bollard::container::StopContainerOptions { t: 5 };
        self.docker
            .stop_container(name, Some(options))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to stop container {}: {}", name, e))
    }

    async fn restart(&self, name: &str) -> Result<()> {
        let options = bollard::container::RestartContainerOptions { t: 5 };
        self.docker
            .restart_container(name, Some(options))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to restart container {}: {}", name, e))
    }
}
