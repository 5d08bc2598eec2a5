//! No-op interceptor

use super::{DatagramInterceptor, InterceptorFactory};
use crate::config::DecoySettings;
use crate::error::Result;
use crate::pool::BufferPool;
use crate::socks::{Datagram, Endpoint};
use crate::transport::DatagramSocket;
use async_trait::async_trait;
use std::sync::Arc;

pub(super) const NAME: &str = "passthrough";

pub(super) fn build(_: &DecoySettings, _: &BufferPool) -> Result<Arc<dyn InterceptorFactory>> {
    Ok(Arc::new(PassthroughFactory))
}

/// Interceptor that never handles anything
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughInterceptor;

#[async_trait]
impl DatagramInterceptor for PassthroughInterceptor {
    async fn try_intercept_outgoing(
        &self,
        _payload: &[u8],
        _destination: &Endpoint,
        _relay: &dyn DatagramSocket,
    ) -> Result<bool> {
        Ok(false)
    }

    async fn try_intercept_incoming(
        &self,
        _datagram: &Datagram<'_>,
        _bound: &dyn DatagramSocket,
    ) -> Result<bool> {
        Ok(false)
    }
}

/// Factory for [`PassthroughInterceptor`]
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughFactory;

impl InterceptorFactory for PassthroughFactory {
    fn name(&self) -> &'static str {
        NAME
    }

    fn create(&self) -> Box<dyn DatagramInterceptor> {
        Box::new(PassthroughInterceptor)
    }
}
