use rpc_proxy::service_proxy;

#[service_proxy(version = "1")]
pub trait Orders {
    async fn get(&self, id: u64) -> Result<u64, rpc_proxy::ProxyError>;
}

fn main() {}
