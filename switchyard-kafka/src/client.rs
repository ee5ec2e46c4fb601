//! rdkafka implementation of the broker-client interface.

use std::sync::Arc;

use async_trait::async_trait;
use rdkafka::consumer::Consumer;
use rdkafka::error::KafkaError;
use switchyard_consumer::{
    ClientBinding, ClientError, ClientEventSender, ClientFactory, ClientResult, ConsumerClient,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::KafkaClientConfig;
use crate::context::ListenerContext;
use crate::poll::{poll_loop, ListenerConsumer, PollControl};

fn broker_error(operation: &str, e: &KafkaError) -> ClientError {
    ClientError::Broker {
        message: format!("{operation}: {e}"),
    }
}

/// Creates [`KafkaConsumerClient`]s sharing one configuration.
#[derive(Debug, Clone)]
pub struct KafkaClientFactory {
    config: Arc<KafkaClientConfig>,
}

impl KafkaClientFactory {
    /// Creates a factory.
    ///
    /// # Errors
    /// Returns `InvalidConfig` if the configuration is unusable.
    pub fn new(config: KafkaClientConfig) -> ClientResult<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
        })
    }
}

impl ClientFactory for KafkaClientFactory {
    fn create(
        &self,
        binding: ClientBinding,
        events: ClientEventSender,
    ) -> ClientResult<Box<dyn ConsumerClient>> {
        Ok(Box::new(KafkaConsumerClient {
            binding,
            config: Arc::clone(&self.config),
            events,
            task: None,
        }))
    }
}

struct PollTask {
    control_tx: watch::Sender<PollControl>,
    join: JoinHandle<ListenerConsumer>,
}

/// One Kafka consumer, recreated on every start.
///
/// A fresh `StreamConsumer` per start means stop followed by start rejoins
/// the group cleanly.
pub struct KafkaConsumerClient {
    binding: ClientBinding,
    config: Arc<KafkaClientConfig>,
    events: ClientEventSender,
    task: Option<PollTask>,
}

impl KafkaConsumerClient {
    fn signal(&self, control: PollControl) -> ClientResult<()> {
        let task = self.task.as_ref().ok_or(ClientError::Closed)?;
        task.control_tx
            .send(control)
            .map_err(|_| ClientError::Closed)
    }

    /// Stops the poll task and closes its consumer off the async runtime.
    async fn shut_down(&self, mut task: PollTask) -> ClientResult<()> {
        let listener_id = &self.binding.listener_id;
        let _ = task.control_tx.send(PollControl::Stop);

        let consumer = match tokio::time::timeout(self.config.shutdown_timeout, &mut task.join).await
        {
            Ok(Ok(consumer)) => consumer,
            Ok(Err(e)) => {
                // The consumer went down with the task; there is nothing left to close.
                warn!(listener_id = %listener_id, error = %e, "Poll task failed, consumer dropped");
                return Ok(());
            }
            Err(_) => {
                warn!(
                    listener_id = %listener_id,
                    timeout_ms = self.config.shutdown_timeout.as_millis(),
                    "Poll task did not stop in time, aborting"
                );
                // Aborting drops the consumer, so the client is stopped either way.
                task.join.abort();
                return Ok(());
            }
        };

        consumer.unsubscribe();
        // Closing leaves the group and blocks until librdkafka is done.
        tokio::task::spawn_blocking(move || drop(consumer))
            .await
            .map_err(|e| ClientError::Broker {
                message: format!("consumer close failed: {e}"),
            })?;

        debug!(listener_id = %listener_id, "Consumer closed");
        Ok(())
    }
}

#[async_trait]
impl ConsumerClient for KafkaConsumerClient {
    async fn start(&mut self) -> ClientResult<()> {
        if let Some(task) = self.task.take() {
            // A previous run halted on its own; close it before rejoining.
            let _ = self.shut_down(task).await;
        }

        let binding = &self.binding;
        let context = ListenerContext::new(binding.listener_id.clone(), self.events.clone());
        let consumer: ListenerConsumer = self
            .config
            .client_config(binding)
            .create_with_context(context)
            .map_err(|e| broker_error("create consumer", &e))?;
        consumer
            .subscribe(&[binding.topic.as_str()])
            .map_err(|e| broker_error("subscribe", &e))?;

        let (control_tx, control_rx) = watch::channel(PollControl::Run);
        let join = tokio::spawn(poll_loop(binding.listener_id.clone(), consumer, control_rx));
        self.task = Some(PollTask { control_tx, join });

        info!(
            listener_id = %binding.listener_id,
            group_id = %binding.group_id,
            topic = %binding.topic,
            "Kafka consumer subscribed"
        );
        Ok(())
    }

    async fn pause(&mut self) -> ClientResult<()> {
        self.signal(PollControl::Pause)
    }

    async fn resume(&mut self) -> ClientResult<()> {
        self.signal(PollControl::Run)
    }

    async fn stop(&mut self) -> ClientResult<()> {
        match self.task.take() {
            Some(task) => self.shut_down(task).await,
            None => Ok(()),
        }
    }
}
