//! Web resources and the verb methods they expose.
//!
//! A resource declares its verb methods as [`WebMethodSpec`]s: the method
//! name, the declared return type, and the typed arguments. Invocation
//! negotiates the response media type, validates and coerces the provided
//! arguments, awaits the resource's `call`, and coerces the return value
//! by the declared return type.

pub mod box_resource;
pub mod webargs;

pub use box_resource::{BoxWebResource, WebResourceDyn};
pub use webargs::WebArgs;

use std::future::Future;

use serde_json::{Map, Value};

use trestle_types::class_def::ClassDefInfo;
use trestle_types::error::WebError;
use trestle_types::webtype::{PrimCoerceError, WebTypeDef};

use crate::http::{best_mediatype, supported_http_methods};
use crate::request::WebRequest;
use crate::response::{DEFAULT_MEDIA_TYPE, ReturnResponse, ReturnResponseData};

// --- Method specs ---

/// A declared web method argument. Required unless it carries a default.
#[derive(Debug, Clone)]
pub struct WebArgSpec {
    pub name: &'static str,
    pub typedef: WebTypeDef,
    pub default: Option<Value>,
}

/// One verb method: its name, declared return type, and arguments.
#[derive(Debug, Clone)]
pub struct WebMethodSpec {
    pub name: &'static str,
    pub returntype: WebTypeDef,
    pub args: Vec<WebArgSpec>,
    /// Accept arguments beyond the declared ones, passed through raw.
    pub takes_arbitrary_args: bool,
}

impl WebMethodSpec {
    pub fn new(name: &'static str, returntype: WebTypeDef) -> Self {
        Self {
            name,
            returntype,
            args: Vec::new(),
            takes_arbitrary_args: false,
        }
    }

    /// Declare a required argument.
    pub fn arg(mut self, name: &'static str, typedef: WebTypeDef) -> Self {
        self.args.push(WebArgSpec {
            name,
            typedef,
            default: None,
        });
        self
    }

    /// Declare an argument that falls back to `default` when absent.
    pub fn optional_arg(mut self, name: &'static str, typedef: WebTypeDef, default: Value) -> Self {
        self.args.push(WebArgSpec {
            name,
            typedef,
            default: Some(default),
        });
        self
    }

    pub fn arbitrary_args(mut self) -> Self {
        self.takes_arbitrary_args = true;
        self
    }
}

// --- The resource trait ---

/// An addressable web entity whose methods implement HTTP verbs.
///
/// Method names are lowercase verb names (`get`, `post`, ...). `options`
/// is answered implicitly for every resource; declaring it overrides the
/// implicit null response.
pub trait WebResource: Send + Sync {
    /// The resource's type tag, as reported in error envelopes.
    fn class_def(&self) -> ClassDefInfo;

    /// The verb methods this resource declares.
    fn webmethods(&self) -> Vec<WebMethodSpec>;

    /// Invoke a declared verb method with validated arguments.
    fn call(
        &self,
        method: &str,
        request: &WebRequest,
        args: WebArgs,
    ) -> impl Future<Output = Result<Value, WebError>> + Send;
}

/// The method names a resource answers to, including the implicit
/// `options`.
pub fn webmethod_names(specs: &[WebMethodSpec]) -> Vec<String> {
    let mut names: Vec<String> = specs.iter().map(|spec| spec.name.to_string()).collect();
    if !names.iter().any(|name| name == "options") {
        names.push("options".to_string());
    }
    names
}

/// The error a resource's `call` raises for a declared method it does not
/// actually implement.
pub fn unimplemented_webmethod(specs: &[WebMethodSpec], method: &str) -> WebError {
    WebError::WebMethodNotImplemented {
        method: method.to_string(),
        allowed: webmethod_names(specs),
    }
}

// --- Argument validation ---

/// Check provided arguments against a method spec and coerce them by
/// their declared types.
///
/// Missing required names and undeclared names are rejected wholesale
/// before any per-argument coercion runs. Declared-but-absent optional
/// arguments take their defaults.
pub fn validate_args(
    spec: &WebMethodSpec,
    provided: &Map<String, Value>,
) -> Result<WebArgs, WebError> {
    let mut missing: Vec<String> = spec
        .args
        .iter()
        .filter(|arg| arg.default.is_none() && !provided.contains_key(arg.name))
        .map(|arg| arg.name.to_string())
        .collect();
    if !missing.is_empty() {
        missing.sort();
        return Err(WebError::MissingRequiredArgs {
            names: missing,
            method: spec.name.to_string(),
        });
    }

    if !spec.takes_arbitrary_args {
        let mut unexpected: Vec<String> = provided
            .keys()
            .filter(|name| !spec.args.iter().any(|arg| arg.name == name.as_str()))
            .cloned()
            .collect();
        if !unexpected.is_empty() {
            unexpected.sort();
            return Err(WebError::UnexpectedArgs {
                names: unexpected,
                method: spec.name.to_string(),
            });
        }
    }

    let mut values = Map::new();
    for arg in &spec.args {
        let value = match provided.get(arg.name) {
            Some(value) => arg
                .typedef
                .from_prim(value)
                .map_err(|err| arg_error(arg.name, value, err))?,
            None => {
                // absent without a default was rejected above
                let Some(default) = &arg.default else { continue };
                default.clone()
            }
        };
        values.insert(arg.name.to_string(), value);
    }
    if spec.takes_arbitrary_args {
        for (name, value) in provided {
            if !spec.args.iter().any(|arg| arg.name == name.as_str()) {
                values.insert(name.clone(), value.clone());
            }
        }
    }
    Ok(WebArgs::new(values))
}

fn arg_error(name: &str, value: &Value, err: PrimCoerceError) -> WebError {
    match err {
        PrimCoerceError::Type { found, expected } => WebError::ArgPrimType {
            name: name.to_string(),
            type_name: found,
            message: None,
            expected_type: Some(expected),
        },
        PrimCoerceError::Value(message) => WebError::ArgPrimValue {
            name: name.to_string(),
            value: value.clone(),
            message: Some(message),
            expected_value: None,
        },
    }
}

// --- Invocation ---

/// Invoke the web method a request resolves to.
pub async fn invoke_webmethod(
    resource: &BoxWebResource,
    request: &WebRequest,
) -> Result<ReturnResponseData, WebError> {
    let specs = resource.webmethods();

    let declared = specs.iter().find(|spec| spec.name == request.webmethod);
    let implicit_options = declared.is_none() && request.webmethod == "options";
    let spec = match declared {
        Some(spec) => spec.clone(),
        None if implicit_options => WebMethodSpec::new("options", WebTypeDef::Null),
        None => {
            let allowed = supported_http_methods(webmethod_names(&specs));
            return Err(WebError::HttpMethodNotAllowed {
                method: request.http_method.clone(),
                allowed: allowed.into_iter().collect(),
                message: None,
            });
        }
    };

    let mediatype = match best_mediatype(&request.acceptable_mediaranges, &[DEFAULT_MEDIA_TYPE]) {
        Some(mediatype) => mediatype.to_string(),
        None => {
            let class_def = resource.class_def();
            return Err(WebError::NoAcceptableMediaType {
                webmethod: format!("{}.{}.{}", class_def.module, class_def.name, spec.name),
                response_displayname: ReturnResponse::displayname().to_string(),
                acceptable: request
                    .acceptable_mediaranges
                    .iter()
                    .map(|entry| entry.range.clone())
                    .collect(),
                supported: vec![DEFAULT_MEDIA_TYPE.to_string()],
            });
        }
    };

    let args = validate_args(&spec, &request.method_args)?;

    let retval = if implicit_options {
        Value::Null
    } else {
        resource.call(spec.name, request, args).await?
    };
    let value = spec
        .returntype
        .from_prim(&retval)
        .map_err(|err| WebError::Unhandled {
            message: format!("invalid '{}' web method return value: {err}", spec.name),
            traceback: None,
        })?;

    Ok(ReturnResponseData {
        value,
        mediatype,
        auth_info: Some(request.auth_info.clone()),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
