//! The `X402Client` reqwest middleware: the eight-step 402 retry loop.

use base64::Engine;
use http::{Extensions, HeaderMap, HeaderValue, StatusCode};
use reqwest::{Request, Response};
use reqwest_middleware as rqm;
use tracing::{debug, instrument, trace};
use x402_types::requirements::Scheme;
use x402_types::{PaymentPayload, PaymentRequired, PaymentRequirements};

use crate::error::X402Error;
use crate::permit_cache::PermitCache;
use crate::scheme::{ClientScheme, ClientSchemes, FirstMatch, PaymentSelector};

const PAYMENT_REQUIRED_HEADERS: [&str; 2] = ["payment-required", "x-payment-required"];
const PAYMENT_SIGNATURE_HEADER: &str = "payment-signature";

fn decode_base64_json<T: serde::de::DeserializeOwned>(raw: &str) -> Option<T> {
    let bytes = base64::engine::general_purpose::STANDARD.decode(raw.trim()).ok()?;
    serde_json::from_slice(&bytes).ok()
}

fn find_header<'a>(headers: &'a HeaderMap, names: &[&str]) -> Option<&'a HeaderValue> {
    names.iter().find_map(|name| headers.get(*name))
}

/// Reads a `PaymentRequired` out of response headers without consuming the
/// body, preferring the canonical header encoding.
fn payment_required_from_headers(headers: &HeaderMap) -> Option<PaymentRequired> {
    let header = find_header(headers, &PAYMENT_REQUIRED_HEADERS)?;
    decode_base64_json(header.to_str().ok()?)
}

/// Parses a `402` response's `PaymentRequired`, consuming the response body
/// as a fallback when no header encoding is present.
async fn parse_payment_required(response: Response) -> Option<PaymentRequired> {
    if let Some(found) = payment_required_from_headers(response.headers()) {
        return Some(found);
    }
    response.json::<PaymentRequired>().await.ok()
}

/// Orchestrates registered [`ClientScheme`]s and payment selection to
/// transparently retry `402 Payment Required` responses (spec §4.4).
pub struct X402Client<TSelector = FirstMatch> {
    schemes: ClientSchemes,
    selector: TSelector,
    permit_cache: PermitCache,
}

impl X402Client<FirstMatch> {
    /// Creates a new client using the default [`FirstMatch`] selector.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for X402Client<FirstMatch> {
    fn default() -> Self {
        X402Client {
            schemes: ClientSchemes::default(),
            selector: FirstMatch,
            permit_cache: PermitCache::new(),
        }
    }
}

impl<TSelector> X402Client<TSelector> {
    /// Registers a scheme client able to sign payloads for one or more networks.
    pub fn register<S: ClientScheme + 'static>(mut self, scheme: S) -> Self {
        self.schemes.push(scheme);
        self
    }

    /// Overrides the default [`FirstMatch`] selection policy.
    pub fn with_selector<P: PaymentSelector + 'static>(self, selector: P) -> X402Client<P> {
        X402Client {
            schemes: self.schemes,
            selector,
            permit_cache: self.permit_cache,
        }
    }
}

impl<TSelector> X402Client<TSelector>
where
    TSelector: PaymentSelector,
{
    /// Steps 4-5 of the retry loop: picks a matching scheme, signs (or
    /// reuses a cached Upto permit for) a payload, and enforces the
    /// Starknet `typedData` precondition.
    #[instrument(name = "x402.reqwest.build_payment", skip_all)]
    async fn build_payment(
        &self,
        payment_required: &PaymentRequired,
    ) -> Result<(PaymentRequirements, PaymentPayload), X402Error> {
        let candidates = self.schemes.candidates(&payment_required.accepts);
        let selected = self
            .selector
            .select(&candidates)
            .ok_or(X402Error::NoMatchingPaymentOption)?
            .clone();

        let payload = self.sign_or_reuse(&selected.requirements, selected.scheme.as_ref()).await?;

        if selected.requirements.network.is_starknet() && payload.payload.starknet_typed_data().is_none() {
            return Err(X402Error::StarknetTypedDataMissing);
        }

        Ok((selected.requirements, payload))
    }

    async fn sign_or_reuse(
        &self,
        requirements: &PaymentRequirements,
        scheme: &dyn ClientScheme,
    ) -> Result<PaymentPayload, X402Error> {
        if requirements.scheme != Scheme::Upto {
            return scheme.sign(requirements).await;
        }
        if let Some(cached) = self.permit_cache.get(&requirements.network, &requirements.asset) {
            return Ok(cached);
        }
        let fresh = scheme.sign(requirements).await?;
        self.permit_cache.put(&requirements.network, &requirements.asset, fresh.clone());
        Ok(fresh)
    }

    /// Forces a fresh signature for `requirements`, replacing whatever
    /// permit was cached for `(network, asset)` (spec §4.4 step 8).
    async fn refresh_payment(
        &self,
        requirements: &PaymentRequirements,
        scheme: &dyn ClientScheme,
    ) -> Result<PaymentPayload, X402Error> {
        self.permit_cache.invalidate(&requirements.network, &requirements.asset);
        let fresh = scheme.sign(requirements).await?;
        self.permit_cache.put(&requirements.network, &requirements.asset, fresh.clone());
        Ok(fresh)
    }

    fn encode_header(payload: &PaymentPayload) -> Result<HeaderValue, X402Error> {
        let json = serde_json::to_vec(payload).map_err(X402Error::JsonEncode)?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(json);
        HeaderValue::from_str(&encoded).map_err(|_| X402Error::HeaderEncode)
    }
}

#[async_trait::async_trait]
impl<TSelector> rqm::Middleware for X402Client<TSelector>
where
    TSelector: PaymentSelector + Send + Sync + 'static,
{
    /// The eight-step `fetchWithPayment` retry loop (spec §4.4).
    #[instrument(name = "x402.reqwest.handle", skip_all, fields(method = %req.method(), url = %req.url()))]
    async fn handle(&self, req: Request, extensions: &mut Extensions, next: rqm::Next<'_>) -> rqm::Result<Response> {
        // 1. Send the request as-is.
        let first_retry = req.try_clone();
        let res = next.clone().run(req, extensions).await?;

        // 2. If status != 402, return the response.
        if res.status() != StatusCode::PAYMENT_REQUIRED {
            trace!(status = ?res.status(), "no payment required");
            return Ok(res);
        }

        debug!("received 402 Payment Required, building payment");

        // 3. Parse PaymentRequired.
        let payment_required = parse_payment_required(res).await.ok_or(X402Error::ParseError)?;

        // 4-5. Build the signed payload for a matched scheme.
        let (selected, payload) = self.build_payment(&payment_required).await.map_err(Into::<rqm::Error>::into)?;
        let scheme = self
            .schemes
            .candidates(std::slice::from_ref(&selected))
            .into_iter()
            .next()
            .map(|c| c.scheme)
            .ok_or(X402Error::NoMatchingPaymentOption)
            .map_err(Into::<rqm::Error>::into)?;

        let mut retry = first_retry.ok_or_else(|| Into::<rqm::Error>::into(X402Error::RequestNotCloneable))?;
        // Kept for a possible third attempt below (step 8).
        let second_retry = retry.try_clone();
        let header_value = Self::encode_header(&payload).map_err(Into::<rqm::Error>::into)?;
        retry.headers_mut().insert(PAYMENT_SIGNATURE_HEADER, header_value);

        // 6. Encode the payload and send again.
        let res2 = next.clone().run(retry, extensions).await?;

        // 7. If the second response is not 402, return it.
        if res2.status() != StatusCode::PAYMENT_REQUIRED {
            return Ok(res2);
        }

        // 8. Upto cap_exhausted/session_closed gets exactly one refreshed retry.
        // The error code is only read from res2's headers, not its JSON body;
        // a facilitator that puts errorReason only in the body won't trigger
        // this refresh. Parsing the body here would consume it, and step 9
        // needs to return res2 verbatim if we don't refresh.
        if selected.scheme == Scheme::Upto {
            let reason = payment_required_from_headers(res2.headers()).and_then(|pr| pr.error);
            if matches!(reason.as_deref(), Some("cap_exhausted") | Some("session_closed")) {
                debug!(reason = ?reason, "refreshing Upto permit after cap rejection");
                let fresh = self
                    .refresh_payment(&selected, scheme.as_ref())
                    .await
                    .map_err(Into::<rqm::Error>::into)?;
                let mut retry2 = second_retry.ok_or_else(|| Into::<rqm::Error>::into(X402Error::RequestNotCloneable))?;
                let header_value = Self::encode_header(&fresh).map_err(Into::<rqm::Error>::into)?;
                retry2.headers_mut().insert(PAYMENT_SIGNATURE_HEADER, header_value);
                return next.run(retry2, extensions).await;
            }
        }

        // 9. Otherwise return the second (402) response to the caller.
        Ok(res2)
    }
}
