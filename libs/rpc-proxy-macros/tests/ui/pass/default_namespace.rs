use rpc_proxy::service_proxy;

mod billing {
    use rpc_proxy::{service_proxy, ProxyResult};

    #[service_proxy(name = "BillingClient")]
    #[async_trait::async_trait]
    pub trait Billing: Send + Sync {
        async fn charge(&self, account: String, cents: u64) -> ProxyResult<bool>;
    }
}

#[service_proxy]
trait Ping {
    async fn ping(&self) -> Result<(), rpc_proxy::ProxyError>;
}

fn main() {
    assert_eq!(
        billing::BillingClient::METHODS[0].service_id,
        concat!(module_path!(), "::billing.Billing.charge_account_cents")
    );
    assert_eq!(PingProxy::DEFINITION.namespace, module_path!());
    assert_eq!(PingProxy::METHODS[0].service_id, concat!(module_path!(), ".Ping.ping"));
}
