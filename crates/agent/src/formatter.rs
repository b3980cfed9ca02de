//! Customer-facing response templates
//!
//! Rendering only. The state machine decides what to say; this module decides
//! how it reads in WhatsApp.

use wa_agent_core::{format_rupiah, BusinessProfile, Cart, Product};

use crate::validator::{RequiredField, ValidationResult};

const ORDER_HOWTO: &str =
    "Ketik *pesan <nama menu> <jumlah>* untuk memesan, contoh: _pesan Salmon Roll 2_";

/// Response formatter
#[derive(Debug, Clone, Default)]
pub struct ResponseFormatter {
    fallback_menu: Vec<String>,
}

impl ResponseFormatter {
    /// `fallback_menu` lines are shown when a tenant has no active products
    pub fn new(fallback_menu: Vec<String>) -> Self {
        Self { fallback_menu }
    }

    /// Full menu grouped by category, in catalog order
    pub fn menu_listing(&self, profile: &BusinessProfile, products: &[Product]) -> String {
        let mut text = format!("📋 *Menu {}*\n", profile.business_name);

        let active: Vec<&Product> = products.iter().filter(|p| p.is_active).collect();
        if active.is_empty() {
            text.push('\n');
            text.push_str(&self.fallback_menu.join("\n"));
        } else {
            let mut categories: Vec<Option<&str>> = Vec::new();
            for product in &active {
                let category = product.category.as_deref();
                if !categories.contains(&category) {
                    categories.push(category);
                }
            }
            let with_headers = categories.len() > 1 || categories[0].is_some();

            for category in categories {
                text.push('\n');
                if with_headers {
                    text.push_str(&format!("*{}*\n", category.unwrap_or("Lainnya")));
                }
                for product in active.iter().filter(|p| p.category.as_deref() == category) {
                    text.push_str(&format!(
                        "• {} - {}\n",
                        product.name,
                        format_rupiah(product.unit_price())
                    ));
                    if let Some(description) = product.description.as_deref().filter(|d| !d.is_empty()) {
                        text.push_str(&format!("  _{}_\n", description));
                    }
                }
            }
        }

        text.push_str("\n\n");
        text.push_str(ORDER_HOWTO);
        text
    }

    /// Numbered item lines plus the total
    pub fn cart_summary(&self, cart: &Cart) -> String {
        let mut text = String::from("🛒 *Pesanan Anda*\n");
        for (i, item) in cart.items().iter().enumerate() {
            text.push_str(&format!(
                "{}. {} x{} = {}\n",
                i + 1,
                item.product_name,
                item.quantity,
                format_rupiah(item.subtotal())
            ));
        }
        text.push_str(&format!("\n*Total: {}*", format_rupiah(cart.total_amount())));
        text
    }

    pub fn items_added(&self, cart: &Cart) -> String {
        format!(
            "✅ Ditambahkan ke pesanan.\n\n{}\n\nKetik nama menu lain untuk menambah, atau ketik *lanjut* untuk checkout.",
            self.cart_summary(cart)
        )
    }

    /// Summary followed by a request for the missing customer details
    pub fn details_request(&self, cart: &Cart, validation: &ValidationResult) -> String {
        format!(
            "{}\n\nUntuk melanjutkan, mohon kirim data berikut:\n{}",
            self.cart_summary(cart),
            Self::field_lines(validation.missing_details())
        )
    }

    pub fn missing_fields_prompt(&self, validation: &ValidationResult) -> String {
        format!(
            "Terima kasih! Data yang masih kami perlukan:\n{}",
            Self::field_lines(validation.missing_details())
        )
    }

    fn field_lines<'a>(fields: impl Iterator<Item = &'a RequiredField>) -> String {
        fields
            .map(|f| format!("• {} ({})", f.label(), f.hint()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn confirmation(&self, cart: &Cart) -> String {
        format!(
            "📝 *Konfirmasi Pesanan*\n\n{}\n\nNama: {}\nHP: {}\nOutlet: {}\nPengambilan: {}\n\nKetik *ya* untuk lanjut ke pembayaran atau *batal* untuk membatalkan.",
            self.cart_summary(cart),
            cart.customer_name.as_deref().unwrap_or("-"),
            cart.phone_number.as_deref().unwrap_or("-"),
            cart.outlet_preference.as_deref().unwrap_or("-"),
            cart.delivery_method.map(|m| m.label()).unwrap_or("-"),
        )
    }

    /// Message accompanying the QR image
    pub fn payment_instructions(&self, order_id: &str, cart: &Cart) -> String {
        format!(
            "✅ *Pesanan Dikonfirmasi*\nNo. Order: {}\nTotal: *{}*\n\nSilakan scan QRIS di atas untuk membayar. Pesanan diproses setelah pembayaran diterima. Terima kasih! 🙏",
            order_id,
            format_rupiah(cart.total_amount())
        )
    }

    /// Text-only variant with the payment link inline
    pub fn payment_link_message(&self, order_id: &str, cart: &Cart, payment_url: Option<&str>) -> String {
        let link = match payment_url {
            Some(url) => format!("Bayar melalui QRIS berikut:\n{}", url),
            None => "Link pembayaran akan kami kirim sebentar lagi.".to_string(),
        };
        format!(
            "✅ *Pesanan Dikonfirmasi*\nNo. Order: {}\nTotal: *{}*\n\n{}\n\nPesanan diproses setelah pembayaran diterima. Terima kasih! 🙏",
            order_id,
            format_rupiah(cart.total_amount()),
            link
        )
    }

    pub fn add_items_first(&self) -> String {
        format!("Pesanan Anda masih kosong. {}", ORDER_HOWTO)
    }

    pub fn item_not_found(&self) -> String {
        "Maaf, menu tersebut tidak kami temukan 🙏 Ketik *menu* untuk melihat daftar menu, atau *lanjut* untuk checkout.".to_string()
    }

    pub fn cancelled(&self) -> String {
        "Pesanan Anda telah dibatalkan. Ketik *menu* kapan saja untuk memesan lagi.".to_string()
    }

    pub fn payment_failed(&self) -> String {
        "Maaf, terjadi kendala saat membuat pembayaran 🙏 Pesanan Anda telah kami batalkan. Silakan coba pesan lagi atau hubungi admin kami.".to_string()
    }

    pub fn awaiting_payment(&self) -> String {
        "Pesanan Anda sedang menunggu pembayaran. Silakan selesaikan pembayaran melalui QRIS yang telah kami kirim, atau ketik *batal* untuk membatalkan.".to_string()
    }

    pub fn payment_expired(&self) -> String {
        "Waktu pembayaran pesanan Anda sebelumnya sudah habis, jadi pesanan tersebut kami batalkan.".to_string()
    }

    pub fn greeting(&self, profile: &BusinessProfile) -> String {
        profile.greeting_text()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::OrderValidator;
    use wa_agent_core::{Decimal, ParsedOrderItem};

    fn profile() -> BusinessProfile {
        BusinessProfile::new("t1", "Sushi Yuk", "62811000")
    }

    fn cart() -> Cart {
        let mut cart = Cart::new("t1", "62811");
        cart.merge_items(&[
            ParsedOrderItem {
                product_id: "p1".to_string(),
                product_name: "Salmon Roll".to_string(),
                quantity: 2,
                price: Decimal::from(50_000),
            },
            ParsedOrderItem {
                product_id: "p2".to_string(),
                product_name: "Ocha".to_string(),
                quantity: 1,
                price: Decimal::from(8_000),
            },
        ]);
        cart
    }

    #[test]
    fn test_menu_grouped_by_category() {
        let products = vec![
            Product::new("p1", "t1", "Salmon Roll", "50000").with_category("Sushi"),
            Product::new("p2", "t1", "Ocha", "8000").with_category("Minuman"),
            Product::new("p3", "t1", "Tuna Roll", "45000")
                .with_category("Sushi")
                .with_description("Tuna segar"),
        ];
        let text = ResponseFormatter::default().menu_listing(&profile(), &products);

        assert!(text.starts_with("📋 *Menu Sushi Yuk*"));
        let sushi = text.find("*Sushi*").unwrap();
        let minuman = text.find("*Minuman*").unwrap();
        let tuna = text.find("Tuna Roll - Rp 45.000").unwrap();
        assert!(sushi < tuna && tuna < minuman);
        assert!(text.contains("_Tuna segar_"));
    }

    #[test]
    fn test_menu_without_categories_has_no_headers() {
        let products = vec![Product::new("p1", "t1", "Salmon Roll", "50000")];
        let text = ResponseFormatter::default().menu_listing(&profile(), &products);
        assert!(text.contains("• Salmon Roll - Rp 50.000"));
        assert!(!text.contains("*Lainnya*"));
    }

    #[test]
    fn test_fallback_menu_when_catalog_empty() {
        let formatter = ResponseFormatter::new(vec![
            "🍣 Salmon Roll - Rp 50.000".to_string(),
            "🍵 Ocha - Rp 8.000".to_string(),
        ]);
        let text = formatter.menu_listing(&profile(), &[]);
        assert!(text.contains("🍣 Salmon Roll - Rp 50.000\n🍵 Ocha - Rp 8.000"));
    }

    #[test]
    fn test_cart_summary() {
        let text = ResponseFormatter::default().cart_summary(&cart());
        assert!(text.contains("1. Salmon Roll x2 = Rp 100.000"));
        assert!(text.contains("2. Ocha x1 = Rp 8.000"));
        assert!(text.contains("*Total: Rp 108.000*"));
    }

    #[test]
    fn test_details_request_lists_missing_fields_in_order() {
        let cart = cart();
        let validation = OrderValidator::new().validate(&cart);
        let text = ResponseFormatter::default().details_request(&cart, &validation);

        let name = text.find("• Nama").unwrap();
        let phone = text.find("• Nomor HP").unwrap();
        let outlet = text.find("• Outlet").unwrap();
        assert!(name < phone && phone < outlet);
        assert!(!text.contains("• Menu pesanan"));
    }

    #[test]
    fn test_payment_link_message() {
        let text = ResponseFormatter::default().payment_link_message(
            "ORDER-t1-1",
            &cart(),
            Some("https://qr.example/1.png"),
        );
        assert!(text.contains("ORDER-t1-1"));
        assert!(text.contains("https://qr.example/1.png"));
        assert!(text.contains("Rp 108.000"));
    }
}
