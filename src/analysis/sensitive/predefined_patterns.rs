use std::collections::BTreeMap;

use super::patterns::SensitivePattern;
use super::result::EntityType;
use crate::infrastructure::error::RedactionError;

/// 预置规则表版本，规则或置信度变化时递增
pub const PATTERN_TABLE_VERSION: u32 = 2;

/// 预置敏感信息模式集合
pub struct PredefinedPatterns;

impl PredefinedPatterns {
    /// 获取所有预置模式
    pub fn get_all_patterns() -> Result<Vec<SensitivePattern>, RedactionError> {
        let mut patterns = Vec::new();

        patterns.extend(Self::get_email_patterns()?);
        patterns.extend(Self::get_phone_patterns()?);
        patterns.extend(Self::get_ssn_patterns()?);
        patterns.extend(Self::get_credit_card_patterns()?);
        patterns.extend(Self::get_date_patterns()?);
        patterns.extend(Self::get_financial_patterns()?);
        patterns.extend(Self::get_medical_patterns()?);

        Ok(patterns)
    }

    /// 邮箱地址，格式完全锚定，置信度最高
    fn get_email_patterns() -> Result<Vec<SensitivePattern>, RedactionError> {
        Ok(vec![SensitivePattern::new(
            "email_address",
            EntityType::Email,
            r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
            0.95,
            "电子邮箱地址",
        )?
        .with_case_sensitivity(false)?])
    }

    /// 北美电话号码
    fn get_phone_patterns() -> Result<Vec<SensitivePattern>, RedactionError> {
        Ok(vec![
            SensitivePattern::new(
                "phone_nanp",
                EntityType::Phone,
                // "+" 不是单词字符，国家码分支不能用 \b 锚定
                r"(?:\+1[-.\s]?|\b1[-.\s]?|\b)\(?[0-9]{3}\)?[-.\s]?[0-9]{3}[-.\s]?[0-9]{4}\b",
                0.90,
                "北美电话号码，可带国家码",
            )?,
            // 括号区号以 "(" 开头，\b 无法锚定，需要单独的模式覆盖完整号码
            SensitivePattern::new(
                "phone_parenthesized",
                EntityType::Phone,
                r"\([0-9]{3}\)\s?[0-9]{3}[-.\s]?[0-9]{4}\b",
                0.90,
                "括号区号格式的电话号码",
            )?,
        ])
    }

    /// 社会安全号码
    fn get_ssn_patterns() -> Result<Vec<SensitivePattern>, RedactionError> {
        Ok(vec![
            SensitivePattern::new(
                "ssn_formatted",
                EntityType::Ssn,
                r"\b[0-9]{3}[-.\s][0-9]{2}[-.\s][0-9]{4}\b",
                0.88,
                "带分隔符的社会安全号码",
            )?,
            // 纯 9 位数字误报较多
            SensitivePattern::new(
                "ssn_bare",
                EntityType::Ssn,
                r"\b[0-9]{9}\b",
                0.85,
                "不带分隔符的 9 位社会安全号码",
            )?,
        ])
    }

    /// 信用卡号
    fn get_credit_card_patterns() -> Result<Vec<SensitivePattern>, RedactionError> {
        Ok(vec![
            SensitivePattern::new(
                "credit_card_visa",
                EntityType::CreditCard,
                r"\b4[0-9]{12}(?:[0-9]{3})?\b",
                0.93,
                "Visa 卡号",
            )?,
            SensitivePattern::new(
                "credit_card_mastercard",
                EntityType::CreditCard,
                r"\b5[1-5][0-9]{14}\b",
                0.93,
                "MasterCard 卡号",
            )?,
            SensitivePattern::new(
                "credit_card_amex",
                EntityType::CreditCard,
                r"\b3[47][0-9]{13}\b",
                0.93,
                "American Express 卡号",
            )?,
            SensitivePattern::new(
                "credit_card_discover",
                EntityType::CreditCard,
                r"\b6(?:011|5[0-9]{2})[0-9]{12}\b",
                0.93,
                "Discover 卡号",
            )?,
            SensitivePattern::new(
                "credit_card_grouped",
                EntityType::CreditCard,
                r"\b(?:[0-9]{4}[-\s]?){3}[0-9]{4}\b",
                0.90,
                "四位分组的通用卡号",
            )?,
        ])
    }

    /// 日期
    fn get_date_patterns() -> Result<Vec<SensitivePattern>, RedactionError> {
        Ok(vec![
            SensitivePattern::new(
                "date_numeric",
                EntityType::Date,
                r"\b[0-9]{1,2}[/-][0-9]{1,2}[/-][0-9]{2,4}\b",
                0.85,
                "数字日期，如 03/14/2024",
            )?,
            SensitivePattern::new(
                "date_iso",
                EntityType::Date,
                r"\b[0-9]{4}[/-][0-9]{1,2}[/-][0-9]{1,2}\b",
                0.85,
                "年份在前的日期，如 2024-03-14",
            )?,
            SensitivePattern::new(
                "date_month_name",
                EntityType::Date,
                r"\b(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)[a-z]*\.?\s+[0-9]{1,2},?\s+[0-9]{2,4}\b",
                0.85,
                "英文月份日期，如 March 14, 2024",
            )?
            .with_case_sensitivity(false)?,
        ])
    }

    /// 金额与银行账户
    fn get_financial_patterns() -> Result<Vec<SensitivePattern>, RedactionError> {
        Ok(vec![
            SensitivePattern::new(
                "financial_dollar_amount",
                EntityType::Financial,
                r"\$\s?[0-9]{1,3}(?:,[0-9]{3})*(?:\.[0-9]{2})?",
                0.90,
                "美元金额，如 $1,250.00",
            )?,
            SensitivePattern::new(
                "financial_currency_suffix",
                EntityType::Financial,
                r"\b[0-9]{1,3}(?:,[0-9]{3})*(?:\.[0-9]{2})?\s?(?:USD|dollars?)\b",
                0.88,
                "带币种后缀的金额，如 500 USD",
            )?
            .with_case_sensitivity(false)?,
            SensitivePattern::new(
                "financial_account_number",
                EntityType::Financial,
                r"\b(?:account|acct)\.?\s?#?\s?[0-9]{4,}\b",
                0.85,
                "银行账号",
            )?
            .with_case_sensitivity(false)?,
            SensitivePattern::new(
                "financial_routing_number",
                EntityType::Financial,
                r"\b(?:routing|rt)\.?\s?#?\s?[0-9]{9}\b",
                0.90,
                "银行路由号",
            )?
            .with_case_sensitivity(false)?,
        ])
    }

    /// 病历号
    fn get_medical_patterns() -> Result<Vec<SensitivePattern>, RedactionError> {
        Ok(vec![SensitivePattern::new(
            "medical_record_number",
            EntityType::Medical,
            r"\b(?:MRN|medical record (?:number|no\.?))\s*[:#]?\s*[0-9]{6,10}\b",
            0.88,
            "病历号",
        )?
        .with_case_sensitivity(false)?])
    }

    pub fn get_pattern_statistics() -> Result<PatternStatistics, RedactionError> {
        let patterns = Self::get_all_patterns()?;
        let mut stats = PatternStatistics::default();

        for pattern in &patterns {
            stats.total_patterns += 1;
            *stats.type_counts.entry(pattern.entity_type.clone()).or_insert(0) += 1;
        }

        Ok(stats)
    }
}

/// 模式统计信息
#[derive(Debug, Clone, Default)]
pub struct PatternStatistics {
    pub total_patterns: usize,
    pub type_counts: BTreeMap<EntityType, usize>,
}
