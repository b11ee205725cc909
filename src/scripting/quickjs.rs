//! QuickJS 脚本宿主
//!
//! 在全局对象上注册 `iap` 模块。脚本调用只把请求写入通道，
//! 由 [`Iap::update`](crate::iap::Iap::update) 在引擎线程上执行；
//! 回调函数和实例对象以 `Persistent` 句柄保存，跨帧存活。
//!
//! ```js
//! iap.set_listener(function (result, error) {
//!     if (error) { log(error.message); return; }
//!     iap.finish(result);
//! });
//! iap.list(["coins_100"], function (products, error) { ... });
//! ```

use super::{CallbackArgs, HostListener, HostRequest, ScriptHost, ScriptRequest, ScriptValue};
use crate::core::{ScriptError, ScriptResult};
use crate::iap::constants::{script_constants, ErrorDescriptor, ProviderId};
use crate::iap::listener::ListenerRegistration;
use crossbeam_channel::{unbounded, Receiver, Sender};
use rquickjs::function::This;
use rquickjs::{
    Array, Context, Ctx, Exception, FromJs, Function, IntoJs, Object, Persistent, Runtime, Value,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// 保存下来的脚本回调
pub type JsCallback = Persistent<Function<'static>>;

type JsRequest = ScriptRequest<JsCallback, QuickJsInstance>;

/// 脚本实例编号，对应脚本中的 `self`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QuickJsInstance(u64);

impl QuickJsInstance {
    /// 全局对象本身
    pub const ROOT: QuickJsInstance = QuickJsInstance(0);
}

/// QuickJS 宿主
pub struct QuickJsHost {
    // 句柄必须先于运行时释放
    instances: HashMap<u64, Persistent<Object<'static>>>,
    requests: Receiver<JsRequest>,
    current: Arc<AtomicU64>,
    next_instance: u64,
    context: Context,
    #[allow(dead_code)]
    runtime: Runtime,
}

impl QuickJsHost {
    /// 创建运行时并注册 `iap` 模块
    pub fn new(provider: ProviderId) -> ScriptResult<Self> {
        let runtime = Runtime::new().map_err(|e| ScriptError::Runtime(e.to_string()))?;
        let context = Context::full(&runtime).map_err(|e| ScriptError::Runtime(e.to_string()))?;
        let (tx, rx) = unbounded();
        let current = Arc::new(AtomicU64::new(QuickJsInstance::ROOT.0));

        let root = context.with(|ctx| {
            install_api(&ctx, tx, Arc::clone(&current), provider)
                .map_err(|e| script_error(&ctx, e))?;
            Ok::<_, ScriptError>(Persistent::save(&ctx, ctx.globals()))
        })?;

        let mut instances = HashMap::new();
        instances.insert(QuickJsInstance::ROOT.0, root);

        tracing::debug!(target: "iap.script", "QuickJS host created");
        Ok(Self {
            instances,
            requests: rx,
            current,
            next_instance: QuickJsInstance::ROOT.0,
            context,
            runtime,
        })
    }

    /// 创建新的脚本实例（一个空对象作为 `self`）
    pub fn create_instance(&mut self) -> ScriptResult<QuickJsInstance> {
        let object = self.context.with(|ctx| {
            Object::new(ctx.clone())
                .map(|object| Persistent::save(&ctx, object))
                .map_err(|e| script_error(&ctx, e))
        })?;

        self.next_instance += 1;
        let instance = QuickJsInstance(self.next_instance);
        self.instances.insert(instance.0, object);
        Ok(instance)
    }

    /// 销毁实例；登记在它名下的回调此后会被跳过
    pub fn destroy_instance(&mut self, instance: QuickJsInstance) {
        if instance == QuickJsInstance::ROOT {
            tracing::warn!(target: "iap.script", "Cannot destroy the root instance");
            return;
        }
        self.instances.remove(&instance.0);
    }

    /// 以 `instance` 为 `self` 执行脚本
    pub fn run(&mut self, instance: QuickJsInstance, source: &str) -> ScriptResult<()> {
        self.with_instance(instance, |ctx, _| ctx.eval::<(), _>(source))
    }

    /// 以 `instance` 为当前调用者执行 `f`
    ///
    /// 期间脚本发起的请求登记在该实例名下；结束后（包括出错时）
    /// 恢复之前的调用者和全局 `self`，回调里嵌套调用也能正确还原。
    fn with_instance<R>(
        &self,
        instance: QuickJsInstance,
        f: impl for<'js> FnOnce(&Ctx<'js>, Object<'js>) -> rquickjs::Result<R>,
    ) -> ScriptResult<R> {
        let this = self
            .instances
            .get(&instance.0)
            .cloned()
            .ok_or(ScriptError::InstanceDestroyed)?;
        let previous = self.current.swap(instance.0, Ordering::AcqRel);

        let outcome = self.context.with(|ctx| {
            let globals = ctx.globals();
            let previous_self: Value = globals.get("self").map_err(|e| script_error(&ctx, e))?;

            let entered = this
                .restore(&ctx)
                .and_then(|this| {
                    globals.set("self", this.clone())?;
                    f(&ctx, this)
                })
                .map_err(|e| script_error(&ctx, e));
            let restored = globals
                .set("self", previous_self)
                .map_err(|e| script_error(&ctx, e));
            entered.and_then(|value| restored.map(|()| value))
        });

        self.current.store(previous, Ordering::Release);
        outcome
    }

    /// 求值并转换为 Rust 类型
    pub fn eval<T>(&self, source: &str) -> ScriptResult<T>
    where
        T: for<'js> FromJs<'js>,
    {
        self.context
            .with(|ctx| ctx.eval::<T, _>(source).map_err(|e| script_error(&ctx, e)))
    }
}

impl ScriptHost for QuickJsHost {
    type Callback = JsCallback;
    type Instance = QuickJsInstance;

    fn is_instance_valid(&self, instance: &QuickJsInstance) -> bool {
        self.instances.contains_key(&instance.0)
    }

    fn invoke(&mut self, listener: &HostListener<Self>, args: CallbackArgs) -> ScriptResult<()> {
        let callback = listener.callback.clone();
        self.with_instance(listener.instance, |ctx, this| {
            let function = callback.restore(ctx)?;
            let result = match &args.result {
                Some(value) => to_js(ctx, value)?,
                None => Value::new_undefined(ctx.clone()),
            };
            let error = match &args.error {
                Some(error) => error_object(ctx, error)?,
                None => Value::new_undefined(ctx.clone()),
            };
            function.call::<_, ()>((This(this), result, error))
        })
    }

    fn release(&mut self, listener: HostListener<Self>) {
        tracing::trace!(target: "iap.script", "release callback of {:?}", listener.instance);
        drop(listener);
    }

    fn take_requests(&mut self) -> Vec<HostRequest<Self>> {
        self.requests.try_iter().collect()
    }
}

// ============================================================================
// iap module
// ============================================================================

fn install_api<'js>(
    ctx: &Ctx<'js>,
    tx: Sender<JsRequest>,
    current: Arc<AtomicU64>,
    provider: ProviderId,
) -> rquickjs::Result<()> {
    let iap = Object::new(ctx.clone())?;

    // iap.list(ids, callback)
    let (sender, caller) = (tx.clone(), Arc::clone(&current));
    iap.set(
        "list",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, product_ids: Vec<String>, callback: Function<'js>| {
                let instance = QuickJsInstance(caller.load(Ordering::Acquire));
                let listener = ListenerRegistration::new(Persistent::save(&ctx, callback), instance);
                let _ = sender.send(ScriptRequest::List {
                    product_ids,
                    listener,
                });
            },
        )?,
    )?;

    // iap.buy(id)
    let sender = tx.clone();
    iap.set(
        "buy",
        Function::new(ctx.clone(), move |product_id: String| {
            let _ = sender.send(ScriptRequest::Buy { product_id });
        })?,
    )?;

    // iap.finish(transaction)
    let sender = tx.clone();
    iap.set(
        "finish",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, transaction: Value<'js>| -> rquickjs::Result<()> {
                let transaction = from_js(&ctx, transaction)?;
                let _ = sender.send(ScriptRequest::Finish { transaction });
                Ok(())
            },
        )?,
    )?;

    // iap.restore() -> true
    let sender = tx.clone();
    iap.set(
        "restore",
        Function::new(ctx.clone(), move || {
            let _ = sender.send(ScriptRequest::Restore);
            true
        })?,
    )?;

    // iap.set_listener(callback)
    let (sender, caller) = (tx, current);
    iap.set(
        "set_listener",
        Function::new(ctx.clone(), move |ctx: Ctx<'js>, callback: Function<'js>| {
            let instance = QuickJsInstance(caller.load(Ordering::Acquire));
            let listener = ListenerRegistration::new(Persistent::save(&ctx, callback), instance);
            let _ = sender.send(ScriptRequest::SetListener { listener });
        })?,
    )?;

    // iap.get_provider_id()
    let provider_code = provider.code();
    iap.set(
        "get_provider_id",
        Function::new(ctx.clone(), move || provider_code)?,
    )?;

    for (name, value) in script_constants() {
        iap.set(name, value)?;
    }

    ctx.globals().set("iap", iap)
}

// ============================================================================
// Value conversion
// ============================================================================

fn to_js<'js>(ctx: &Ctx<'js>, value: &ScriptValue) -> rquickjs::Result<Value<'js>> {
    match value {
        ScriptValue::Null => Ok(Value::new_null(ctx.clone())),
        ScriptValue::Bool(b) => b.into_js(ctx),
        ScriptValue::Number(n) => n.into_js(ctx),
        ScriptValue::String(s) => s.as_str().into_js(ctx),
        ScriptValue::Array(items) => {
            let array = Array::new(ctx.clone())?;
            for (index, item) in items.iter().enumerate() {
                array.set(index, to_js(ctx, item)?)?;
            }
            array.into_js(ctx)
        }
        ScriptValue::Object(fields) => {
            let object = Object::new(ctx.clone())?;
            for (key, item) in fields {
                object.set(key.as_str(), to_js(ctx, item)?)?;
            }
            object.into_js(ctx)
        }
    }
}

fn from_js<'js>(ctx: &Ctx<'js>, value: Value<'js>) -> rquickjs::Result<ScriptValue> {
    let Some(json) = ctx.json_stringify(value)? else {
        return Ok(ScriptValue::Null);
    };
    let json = json.to_string()?;
    serde_json::from_str::<serde_json::Value>(&json)
        .map(ScriptValue::from)
        .map_err(|e| Exception::throw_type(ctx, &e.to_string()))
}

fn error_object<'js>(ctx: &Ctx<'js>, error: &ErrorDescriptor) -> rquickjs::Result<Value<'js>> {
    let object = Object::new(ctx.clone())?;
    object.set("message", error.message.as_str())?;
    object.set("reason", error.reason.code())?;
    object.into_js(ctx)
}

fn script_error(ctx: &Ctx<'_>, error: rquickjs::Error) -> ScriptError {
    match error {
        rquickjs::Error::Exception => {}
        rquickjs::Error::FromJs { .. } => return ScriptError::Conversion(error.to_string()),
        other => return ScriptError::Runtime(other.to_string()),
    }

    let thrown = ctx.catch();
    match thrown.as_exception() {
        Some(exception) => ScriptError::Runtime(exception.message().unwrap_or_default()),
        None => ScriptError::Runtime(format!("uncaught value: {:?}", thrown)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants_and_provider() {
        let host = QuickJsHost::new(ProviderId::Amazon).unwrap();
        assert_eq!(host.eval::<i32>("iap.get_provider_id()").unwrap(), 1);
        assert_eq!(host.eval::<i32>("iap.TRANS_STATE_PURCHASED").unwrap(), 1);
        assert_eq!(host.eval::<i32>("iap.REASON_USER_CANCELED").unwrap(), 1);
    }

    #[test]
    fn test_script_calls_become_requests() {
        let mut host = QuickJsHost::new(ProviderId::Google).unwrap();
        let instance = host.create_instance().unwrap();
        host.run(
            instance,
            r#"
            iap.list(["coins_100", "gems_5"], function (products, error) {});
            iap.buy("coins_100");
            var restored = iap.restore();
            "#,
        )
        .unwrap();

        let requests = host.take_requests();
        assert_eq!(requests.len(), 3);
        match &requests[0] {
            ScriptRequest::List {
                product_ids,
                listener,
            } => {
                assert_eq!(product_ids, &["coins_100".to_string(), "gems_5".to_string()]);
                assert_eq!(listener.instance, instance);
            }
            other => panic!("unexpected request {:?}", other),
        }
        assert!(host.eval::<bool>("restored").unwrap());
        assert!(host.take_requests().is_empty());
    }

    #[test]
    fn test_finish_converts_transaction() {
        let mut host = QuickJsHost::new(ProviderId::Google).unwrap();
        host.run(
            QuickJsInstance::ROOT,
            r#"iap.finish({ receipt: "r-1", state: iap.TRANS_STATE_PURCHASED });"#,
        )
        .unwrap();

        let requests = host.take_requests();
        let ScriptRequest::Finish { transaction } = &requests[0] else {
            panic!("expected finish request");
        };
        assert_eq!(transaction.get("receipt").and_then(ScriptValue::as_str), Some("r-1"));
        assert_eq!(transaction.get("state").and_then(ScriptValue::as_number), Some(1.0));
    }

    #[test]
    fn test_script_exception_message() {
        let mut host = QuickJsHost::new(ProviderId::Google).unwrap();
        let err = host
            .run(QuickJsInstance::ROOT, "throw new Error('boom');")
            .unwrap_err();
        assert_eq!(err, ScriptError::Runtime("boom".to_string()));
    }

    #[test]
    fn test_eval_conversion_error() {
        let host = QuickJsHost::new(ProviderId::Google).unwrap();
        assert!(matches!(
            host.eval::<i32>("'not a number'"),
            Err(ScriptError::Conversion(_))
        ));
    }

    #[test]
    fn test_destroyed_instance() {
        let mut host = QuickJsHost::new(ProviderId::Google).unwrap();
        let instance = host.create_instance().unwrap();
        host.destroy_instance(instance);
        assert!(!host.is_instance_valid(&instance));
        assert!(host.is_instance_valid(&QuickJsInstance::ROOT));
        assert_eq!(
            host.run(instance, "1"),
            Err(ScriptError::InstanceDestroyed)
        );
    }
}
