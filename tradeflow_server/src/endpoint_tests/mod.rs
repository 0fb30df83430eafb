mod helpers;
mod mocks;

mod orders;
mod purchase_orders;
mod webhooks;
