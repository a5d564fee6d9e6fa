use overcloud_workflow::{EventReporter, OperationEvent};
use tracing::debug;

/// Prints operation events for the operator
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleReporter;

impl EventReporter for ConsoleReporter {
    fn report(&self, event: OperationEvent) {
        match event {
            OperationEvent::Submitted {
                workflow,
                execution_id,
                queue,
            } => {
                debug!(workflow = %workflow, execution = %execution_id, queue = %queue, "Submitted");
                println!("Started {} ({}), waiting for the result...", workflow, execution_id);
            }
            OperationEvent::Progress { message, .. } => println!("{}", message),
            OperationEvent::Completed {
                success: true,
                message: Some(message),
                ..
            } => println!("{}", message),
            OperationEvent::Completed { .. } => {}
            OperationEvent::NodeRegistered { uuid } => {
                println!("Successfully registered node UUID {}", uuid)
            }
            OperationEvent::NodeIntrospected { node_id, error: None } => {
                println!("Introspection for UUID {} finished successfully.", node_id)
            }
            OperationEvent::NodeIntrospected {
                node_id,
                error: Some(error),
            } => println!(
                "Introspection for UUID {} finished with error: {}",
                node_id, error
            ),
            OperationEvent::ServerDeployed { server, error: None } => {
                println!("{}: deployment succeeded", server)
            }
            OperationEvent::ServerDeployed {
                server,
                error: Some(error),
            } => println!("{}: deployment failed: {}", server, error),
        }
    }
}
