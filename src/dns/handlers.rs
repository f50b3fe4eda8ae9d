use crate::dns::authority::Lookup;
use crate::dns::router::{Routed, SharedRouter};
use crate::error::Error;
use tracing::error;
use trust_dns_server::authority::MessageResponseBuilder;
use trust_dns_server::client::op::{Header, MessageType, OpCode, ResponseCode};
use trust_dns_server::client::rr::Record;
use trust_dns_server::server::{Request, RequestHandler, ResponseHandler, ResponseInfo};

#[derive(Clone)]
pub struct Handler {
    router: SharedRouter,
}

impl Handler {
    pub(super) fn new(router: SharedRouter) -> Self {
        Handler { router }
    }

    async fn dispatch_request<R: ResponseHandler>(
        &self,
        request: &Request,
        response: R,
    ) -> Result<ResponseInfo, Error> {
        // If it isn't a query, return NOTIMPL.
        if request.op_code() != OpCode::Query || request.message_type() != MessageType::Query {
            return self.handle_notimpl(request, response).await;
        }

        let query = request.query();
        let routed = self.router.read().await.lookup(
            query.name(),
            query.query_class(),
            query.query_type(),
        );
        tracing::debug!(
            "query {} {} {}: {routed:?}",
            query.name(),
            query.query_class(),
            query.query_type()
        );
        match routed {
            Routed::Refused => self.send_refused(request, response).await,
            Routed::Authoritative { lookup, soa } => match lookup {
                Lookup::Answer(records) => self.send_auth_resp(request, response, records).await,
                Lookup::NoData => {
                    self.send_negative(request, response, soa, ResponseCode::NoError)
                        .await
                }
                Lookup::NxDomain => {
                    self.send_negative(request, response, soa, ResponseCode::NXDomain)
                        .await
                }
            },
        }
    }

    async fn handle_notimpl<R: ResponseHandler>(
        &self,
        request: &Request,
        mut response_handle: R,
    ) -> Result<ResponseInfo, Error> {
        let response = MessageResponseBuilder::from_message_request(request);
        Ok(response_handle
            .send_response(response.error_msg(request.header(), ResponseCode::NotImp))
            .await?)
    }

    async fn send_refused<R: ResponseHandler>(
        &self,
        request: &Request,
        mut response_handle: R,
    ) -> Result<ResponseInfo, Error> {
        let response = MessageResponseBuilder::from_message_request(request);
        Ok(response_handle
            .send_response(response.error_msg(request.header(), ResponseCode::Refused))
            .await?)
    }

    async fn send_auth_resp<R: ResponseHandler>(
        &self,
        request: &Request,
        mut response_handle: R,
        records: Vec<Record>,
    ) -> Result<ResponseInfo, Error> {
        let mut header = Header::response_from_request(request.header());
        header.set_authoritative(true);
        let builder = MessageResponseBuilder::from_message_request(request);
        let response = builder.build(header, records.iter(), &[], &[], &[]);
        Ok(response_handle.send_response(response).await?)
    }

    async fn send_negative<R: ResponseHandler>(
        &self,
        request: &Request,
        mut response_handle: R,
        soa: Record,
        code: ResponseCode,
    ) -> Result<ResponseInfo, Error> {
        let builder = MessageResponseBuilder::from_message_request(request);
        let mut header = Header::response_from_request(request.header());
        header.set_authoritative(true);
        header.set_response_code(code);
        let soa = [soa];
        let response = builder.build(header, &[], &[], soa.iter(), &[]);
        Ok(response_handle.send_response(response).await?)
    }
}

#[async_trait::async_trait]
impl RequestHandler for Handler {
    async fn handle_request<R: ResponseHandler>(
        &self,
        request: &Request,
        response_handle: R,
    ) -> ResponseInfo {
        match self.dispatch_request(request, response_handle).await {
            Ok(info) => info,
            Err(error) => {
                error!("error in RequestHandler: {:?}", error);
                let mut header = Header::new();
                header.set_response_code(ResponseCode::ServFail);
                header.into()
            }
        }
    }
}
