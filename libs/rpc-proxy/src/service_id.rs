//! Service id derivation.
//!
//! `#[service_proxy]` bakes ids into the generated adapters at compile time;
//! this generator reproduces the same strings at run time so a server can
//! register handlers under ids its clients agree on.

/// Derives the stable id of one operation.
pub trait ServiceIdGenerator: Send + Sync {
    fn generate(&self, namespace: &str, interface: &str, method: &str, parameters: &[&str])
    -> String;
}

/// `{namespace}.{Interface}.{method}` plus `_{param}` per declared parameter.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultServiceIdGenerator;

impl ServiceIdGenerator for DefaultServiceIdGenerator {
    fn generate(
        &self,
        namespace: &str,
        interface: &str,
        method: &str,
        parameters: &[&str],
    ) -> String {
        let capacity = namespace.len()
            + interface.len()
            + method.len()
            + 2
            + parameters.iter().map(|p| p.len() + 1).sum::<usize>();
        let mut id = String::with_capacity(capacity);
        id.push_str(namespace);
        id.push('.');
        id.push_str(interface);
        id.push('.');
        id.push_str(method);
        for p in parameters {
            id.push('_');
            id.push_str(p);
        }
        id
    }
}
