use rpc_proxy::service_proxy;

#[service_proxy]
pub trait Orders {
    async fn count(&self) -> u64;
}

fn main() {}
