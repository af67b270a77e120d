use rpc_proxy::{service_proxy, ProxyError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub total: f64,
}

#[service_proxy(namespace = "shop.orders")]
pub trait OrderService {
    async fn get(&self, id: u64) -> Result<Order, ProxyError>;
    async fn cancel(&self, id: u64, reason: String) -> Result<(), ProxyError>;
    async fn count(&self) -> Result<u64, ProxyError>;
}

fn assert_thread_safe<T: ?Sized + Send + Sync>() {}

fn main() {
    assert_thread_safe::<dyn OrderService>();

    let ids: Vec<_> = OrderServiceProxy::METHODS.iter().map(|m| m.service_id).collect();
    assert_eq!(
        ids,
        [
            "shop.orders.OrderService.get_id",
            "shop.orders.OrderService.cancel_id_reason",
            "shop.orders.OrderService.count",
        ]
    );
    assert!(OrderServiceProxy::METHODS[1].returns_unit);
    assert_eq!(OrderServiceProxy::DEFINITION.adapter, "OrderServiceProxy");
}
