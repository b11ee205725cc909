//! Android 计费层（JNI）
//!
//! 通过 activity 的 ClassLoader 加载 `com.defold.iap.IapGooglePlay` 或
//! `com.defold.iap.IapAmazon`，调用其 Java 方法；Java 侧在自己的线程上
//! 通过 `com.defold.iap.IapJNI` 的 native 方法把结果送回。
//!
//! native 方法没有上下文参数，因此结果入口保存在进程级的 [`RESULT_SINK`] 中。

use super::BillingProvider;
use crate::config::ProviderConfig;
use crate::core::{PlatformError, PlatformResult};
use crate::relay::ResultSink;
use jni::objects::{GlobalRef, JClass, JObject, JString, JValue};
use jni::sys::{jboolean, jint};
use jni::{JNIEnv, JavaVM};
use std::sync::{PoisonError, RwLock};

const IAP_JNI_CLASS: &str = "com.defold.iap.IapJNI";

const SIG_CONSTRUCTOR: &str = "(Landroid/app/Activity;Z)V";
const SIG_LIST_ITEMS: &str = "(Ljava/lang/String;Lcom/defold/iap/IListProductsListener;)V";
const SIG_BUY: &str = "(Ljava/lang/String;Lcom/defold/iap/IPurchaseListener;)V";
const SIG_RESTORE: &str = "(Lcom/defold/iap/IPurchaseListener;)V";
const SIG_PROCESS_PENDING: &str = "(Lcom/defold/iap/IPurchaseListener;)V";
const SIG_FINISH_TRANSACTION: &str = "(Ljava/lang/String;Lcom/defold/iap/IPurchaseListener;)V";

/// 原生回调的结果入口
static RESULT_SINK: RwLock<Option<ResultSink>> = RwLock::new(None);

/// 安装结果入口，替换已有的
pub fn install_result_sink(sink: ResultSink) {
    *RESULT_SINK.write().unwrap_or_else(PoisonError::into_inner) = Some(sink);
}

/// 移除结果入口；之后到达的结果被丢弃
pub fn clear_result_sink() {
    RESULT_SINK
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
}

fn with_sink(f: impl FnOnce(&ResultSink) -> bool) {
    let guard = RESULT_SINK.read().unwrap_or_else(PoisonError::into_inner);
    match guard.as_ref() {
        Some(sink) => {
            if !f(sink) {
                tracing::warn!(target: "iap.android", "IAP result arrived after shutdown");
            }
        }
        None => tracing::warn!(target: "iap.android", "IAP result arrived with no extension running"),
    }
}

fn read_optional_string(env: &mut JNIEnv, value: &JString) -> Option<String> {
    if value.is_null() {
        return None;
    }
    match env.get_string(value) {
        Ok(java_str) => Some(java_str.into()),
        Err(e) => {
            tracing::error!(target: "iap.android", "Failed to read result string: {}", e);
            None
        }
    }
}

#[no_mangle]
pub extern "system" fn Java_com_defold_iap_IapJNI_onProductsResult__ILjava_lang_String_2(
    mut env: JNIEnv,
    _this: JObject,
    response_code: jint,
    product_list: JString,
) {
    let product_list = read_optional_string(&mut env, &product_list);
    with_sink(|sink| sink.product_list_completed(response_code, product_list));
}

#[no_mangle]
pub extern "system" fn Java_com_defold_iap_IapJNI_onPurchaseResult__ILjava_lang_String_2(
    mut env: JNIEnv,
    _this: JObject,
    response_code: jint,
    purchase_data: JString,
) {
    let purchase_data = read_optional_string(&mut env, &purchase_data);
    with_sink(|sink| sink.purchase_completed(response_code, purchase_data));
}

fn jni_error(e: jni::errors::Error) -> PlatformError {
    PlatformError::Jni(e.to_string())
}

/// Java 计费实现
pub struct JniBillingProvider {
    vm: JavaVM,
    /// IapGooglePlay / IapAmazon 实例
    iap: GlobalRef,
    /// IapJNI 实例，同时实现两个监听器接口
    listener: GlobalRef,
}

impl JniBillingProvider {
    /// 加载配置指定的 Java 实现并安装结果入口
    pub fn new(
        vm: JavaVM,
        activity: &JObject,
        config: &ProviderConfig,
        sink: ResultSink,
    ) -> PlatformResult<Self> {
        let (iap, listener) = {
            let mut env = vm.attach_current_thread().map_err(jni_error)?;
            let loader = env
                .call_method(activity, "getClassLoader", "()Ljava/lang/ClassLoader;", &[])
                .and_then(|v| v.l())
                .map_err(jni_error)?;

            let iap_class = load_class(&mut env, &loader, config.provider.java_class())?;
            let jni_class = load_class(&mut env, &loader, IAP_JNI_CLASS)?;

            let auto_finish = jboolean::from(config.auto_finish_transactions);
            let iap = env
                .new_object(
                    &iap_class,
                    SIG_CONSTRUCTOR,
                    &[JValue::Object(activity), JValue::Bool(auto_finish)],
                )
                .and_then(|obj| env.new_global_ref(obj))
                .map_err(jni_error)?;
            let listener = env
                .new_object(&jni_class, "()V", &[])
                .and_then(|obj| env.new_global_ref(obj))
                .map_err(jni_error)?;
            (iap, listener)
        };

        install_result_sink(sink);
        tracing::info!(
            target: "iap.android",
            "Loaded billing provider {}",
            config.provider.java_class()
        );
        Ok(Self { vm, iap, listener })
    }

    fn call(
        &self,
        method: &'static str,
        sig: &str,
        string_arg: Option<&str>,
        with_listener: bool,
    ) -> PlatformResult<()> {
        let mut env = self.vm.attach_current_thread().map_err(jni_error)?;

        let string_arg = match string_arg {
            Some(s) => Some(env.new_string(s).map_err(jni_error)?),
            None => None,
        };
        let mut args = Vec::with_capacity(2);
        if let Some(s) = &string_arg {
            args.push(JValue::Object(s));
        }
        if with_listener {
            args.push(JValue::Object(self.listener.as_obj()));
        }

        let outcome = env.call_method(self.iap.as_obj(), method, sig, &args);
        if outcome.is_err() && env.exception_check().unwrap_or(false) {
            let _ = env.exception_describe();
            let _ = env.exception_clear();
        }
        outcome.map(|_| ()).map_err(|e| PlatformError::Call {
            method,
            reason: e.to_string(),
        })
    }
}

fn load_class<'local>(
    env: &mut JNIEnv<'local>,
    loader: &JObject,
    class_name: &str,
) -> PlatformResult<JClass<'local>> {
    let name = env.new_string(class_name).map_err(jni_error)?;
    let class = env
        .call_method(
            loader,
            "loadClass",
            "(Ljava/lang/String;)Ljava/lang/Class;",
            &[JValue::Object(&name)],
        )
        .and_then(|v| v.l())
        .map_err(|e| PlatformError::Jni(format!("failed to load {}: {}", class_name, e)))?;
    Ok(JClass::from(class))
}

impl BillingProvider for JniBillingProvider {
    fn list_items(&self, product_ids_json: &str) -> PlatformResult<()> {
        self.call("listItems", SIG_LIST_ITEMS, Some(product_ids_json), true)
    }

    fn buy(&self, product_id: &str) -> PlatformResult<()> {
        self.call("buy", SIG_BUY, Some(product_id), true)
    }

    fn restore(&self) -> PlatformResult<()> {
        self.call("restore", SIG_RESTORE, None, true)
    }

    fn finish_transaction(&self, receipt: &str) -> PlatformResult<()> {
        self.call(
            "finishTransaction",
            SIG_FINISH_TRANSACTION,
            Some(receipt),
            true,
        )
    }

    fn process_pending_consumables(&self) -> PlatformResult<()> {
        self.call("processPendingConsumables", SIG_PROCESS_PENDING, None, true)
    }

    fn stop(&self) -> PlatformResult<()> {
        let outcome = self.call("stop", "()V", None, false);
        clear_result_sink();
        outcome
    }
}
