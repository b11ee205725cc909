//! 核心宏定义
//!
//! 配置结构体的默认值统一用宏声明，默认值与字段写在一起

/// 为结构体实现Default trait的宏
///
/// 使用示例:
/// ```rust
/// # use game_engine_iap::impl_default;
/// struct IapSettings {
///     auto_finish_transactions: bool,
///     product_prefix: String,
/// }
///
/// impl_default!(IapSettings {
///     auto_finish_transactions: true,
///     product_prefix: String::new(),
/// });
/// ```
#[macro_export]
macro_rules! impl_default {
    ($struct_name:ident {
        $($field:ident: $value:expr),* $(,)?
    }) => {
        impl Default for $struct_name {
            fn default() -> Self {
                Self {
                    $($field: $value),*
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {

    struct RetryWindow {
        attempts: u32,
        label: String,
    }

    impl_default!(RetryWindow {
        attempts: 3,
        label: "purchase".to_string(),
    });

    #[test]
    fn test_impl_default() {
        let window = RetryWindow::default();

        assert_eq!(window.attempts, 3);
        assert_eq!(window.label, "purchase");
    }
}
