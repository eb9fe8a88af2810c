//! Built-in sample drafts for trying the pipeline

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SampleDraft {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub input_text: &'static str,
}

const HR_POLICY: &str = "\
DRAFT - Remote Work Policy v0.1

Hi all! We're really excited to share the new remote work policy. Everyone is going to love it!

Who can work remotely?
Basically anybody, any day they like. Give your manager a heads-up and you're set.

Equipment
You get a laptop, plus a monitor if you ask. Look after them. If anything breaks, write to IT at helpdesk@company.com or call 555-123-4567.

Hours
Be online for core hours (10am-3pm). Outside of that it's flexible and we don't track time.

Security
Use the VPN for sensitive data and avoid public wifi. Following these rules makes remote work 100% safe.

Benefits
Remote work is guaranteed for every employee, and there is no risk of it being taken away once you start.

Questions?
Ask HR or your manager.

- The People Team
";

const PRODUCT_WARRANTY: &str = "\
PRODUCT WARRANTY - SMARTWIDGET PRO 3000

Thanks for buying the SmartWidget Pro 3000! It is guaranteed to work perfectly, and we promise you will never have a problem with it.

COVERAGE
This warranty covers anything that could go wrong with the device. It's risk-free: you are covered unconditionally.

DURATION
Valid for 2 years from the purchase date. Lost your receipt? Email warranty@widgets.com.

WHAT WE DO
If it breaks we repair or replace it. Reach support at 1-800-555-0199 or support@widgets.com.

EXCLUSIONS
Not decided yet. Probably don't drop it in water.

CLAIMS
1. Contact us
2. Describe the problem
3. Ship the product with the label we email you
4. Receive your repaired or new widget

SmartWidget Inc.
123 Tech Boulevard
Innovation City, TC 12345
";

static SAMPLES: [SampleDraft; 2] = [
    SampleDraft {
        id: "hr-policy",
        name: "HR Remote Work Policy",
        description: "Informal remote work policy draft with contact details and missing disclaimers.",
        input_text: HR_POLICY,
    },
    SampleDraft {
        id: "product-warranty",
        name: "Product Warranty Terms",
        description: "Warranty terms full of absolute promises and vague exclusions.",
        input_text: PRODUCT_WARRANTY,
    },
];

pub fn all_samples() -> &'static [SampleDraft] {
    &SAMPLES
}

/// Case-insensitive lookup by id
pub fn sample_by_id(id: &str) -> Option<&'static SampleDraft> {
    SAMPLES.iter().find(|s| s.id.eq_ignore_ascii_case(id))
}
