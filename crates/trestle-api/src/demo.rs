//! The demo web service: a small resource set exercising the framework
//! end to end.
//!
//! `/helloworld` and `/echo` are open, `/users/{name}` shows path
//! arguments, and the `/secrets` subtree sits behind HTTP Basic auth
//! against the configured user map.

use serde_json::{Value, json};

use trestle_types::class_def::ClassDefInfo;
use trestle_types::config::TrestleConfig;
use trestle_types::error::WebError;
use trestle_types::webtype::WebTypeDef;

use trestle_core::auth::{AuthScheme, Authenticator, ConnectorChain, Space, SpaceMap};
use trestle_core::cors::{CorsAffordanceMap, CorsAffordanceSet};
use trestle_core::mappings::WebResourcePathMap;
use trestle_core::request::WebRequest;
use trestle_core::resource::{
    BoxWebResource, WebArgs, WebMethodSpec, WebResource, unimplemented_webmethod,
};
use trestle_core::service::ServiceContext;

use trestle_infra::auth::{HttpBasicClerk, HttpBasicScanner, InMemoryPlainSupplicant};

/// Greets whoever asks.
pub struct HelloWorld;

impl WebResource for HelloWorld {
    fn class_def(&self) -> ClassDefInfo {
        ClassDefInfo::new("trestle_api::demo", "HelloWorld")
    }

    fn webmethods(&self) -> Vec<WebMethodSpec> {
        vec![WebMethodSpec::new("get", WebTypeDef::Unicode).optional_arg(
            "who",
            WebTypeDef::Unicode,
            json!("world"),
        )]
    }

    async fn call(
        &self,
        method: &str,
        _request: &WebRequest,
        args: WebArgs,
    ) -> Result<Value, WebError> {
        match method {
            "get" => Ok(json!(format!("Hello, {}!", args.unicode("who")?))),
            other => Err(unimplemented_webmethod(&self.webmethods(), other)),
        }
    }
}

/// Returns whatever text it was sent.
pub struct Echo;

impl WebResource for Echo {
    fn class_def(&self) -> ClassDefInfo {
        ClassDefInfo::new("trestle_api::demo", "Echo")
    }

    fn webmethods(&self) -> Vec<WebMethodSpec> {
        vec![
            WebMethodSpec::new("get", WebTypeDef::Unicode).optional_arg(
                "text",
                WebTypeDef::Unicode,
                json!(""),
            ),
            WebMethodSpec::new("post", WebTypeDef::Unicode).arg("text", WebTypeDef::Unicode),
        ]
    }

    async fn call(
        &self,
        method: &str,
        _request: &WebRequest,
        args: WebArgs,
    ) -> Result<Value, WebError> {
        match method {
            "get" | "post" => Ok(json!(args.unicode("text")?)),
            other => Err(unimplemented_webmethod(&self.webmethods(), other)),
        }
    }
}

/// A per-user profile; the user's name rides in the path.
pub struct UserProfile;

impl WebResource for UserProfile {
    fn class_def(&self) -> ClassDefInfo {
        ClassDefInfo::new("trestle_api::demo", "UserProfile")
    }

    fn webmethods(&self) -> Vec<WebMethodSpec> {
        vec![WebMethodSpec::new(
            "get",
            WebTypeDef::Dict(Box::new(WebTypeDef::Unicode), Box::new(WebTypeDef::Unicode)),
        )]
    }

    async fn call(
        &self,
        method: &str,
        request: &WebRequest,
        _args: WebArgs,
    ) -> Result<Value, WebError> {
        match method {
            "get" => {
                let name = request
                    .resource_args
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or("anonymous");
                Ok(json!({
                    "name": name,
                    "greeting": format!("Welcome back, {name}!"),
                }))
            }
            other => Err(unimplemented_webmethod(&self.webmethods(), other)),
        }
    }
}

/// Reports who the service authenticated; only reachable with accepted
/// credentials.
pub struct Secrets;

impl WebResource for Secrets {
    fn class_def(&self) -> ClassDefInfo {
        ClassDefInfo::new("trestle_api::demo", "Secrets")
    }

    fn webmethods(&self) -> Vec<WebMethodSpec> {
        vec![WebMethodSpec::new(
            "get",
            WebTypeDef::Dict(Box::new(WebTypeDef::Unicode), Box::new(WebTypeDef::Unicode)),
        )]
    }

    async fn call(
        &self,
        method: &str,
        request: &WebRequest,
        _args: WebArgs,
    ) -> Result<Value, WebError> {
        match method {
            "get" => {
                let user = request.auth_info.user().unwrap_or("nobody");
                Ok(json!({
                    "user": user,
                    "clearance": "confidential",
                }))
            }
            other => Err(unimplemented_webmethod(&self.webmethods(), other)),
        }
    }
}

/// Assemble the demo service context from configuration.
pub fn build_demo_context(config: &TrestleConfig) -> anyhow::Result<ServiceContext> {
    let mut resources = WebResourcePathMap::new();
    resources.insert("/helloworld", BoxWebResource::new(HelloWorld))?;
    resources.insert("/echo", BoxWebResource::new(Echo))?;
    resources.insert("/users/(?P<name>[^/]+)", BoxWebResource::new(UserProfile))?;
    resources.insert("/secrets", BoxWebResource::new(Secrets))?;

    let mut auth_spaces = SpaceMap::new();
    auth_spaces.insert("/secrets", Space::basic_realm(config.auth.realm.clone()))?;

    let mut authenticator = Authenticator::new();
    authenticator.register(ConnectorChain::new(
        AuthScheme::Basic,
        HttpBasicScanner,
        InMemoryPlainSupplicant::new(
            config.auth.realm.clone(),
            config
                .auth
                .users
                .iter()
                .map(|(user, password)| (user.clone(), password.clone())),
        ),
        HttpBasicClerk,
    ));

    let mut cors_affordances = CorsAffordanceMap::new();
    cors_affordances.insert("/", CorsAffordanceSet::max())?;

    Ok(ServiceContext {
        uris: vec![format!("http://{}", config.service.bind_addr())],
        resources,
        auth_spaces,
        authenticator,
        cors_affordances,
        debug_flags: config.service.debug_flags,
    })
}
