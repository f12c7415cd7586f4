//! Selector bindings for the jobui.com page families.

use scraper::Selector;

use crate::error::AppError;
use crate::extract::{BreakoutSpec, FieldSpec, PageExtractor, Probe, SliceRule, parse_selector};
use crate::models::FieldId;

pub const DIRECTORY_URL: &str = "https://www.jobui.com/job?cityKw=%E5%85%A8%E5%9B%BD";
pub const SALARY_URL_TEMPLATE: &str = "https://www.jobui.com/salary/{key}";
pub const TRENDS_URL_TEMPLATE: &str = "https://www.jobui.com/trends/{key}";
/// Region prefix meaning "nationwide".
pub const DEFAULT_REGION: &str = "全国";

const DIRECTORY_NAMES: &str = ".job-list-box .j-work-detail-list a";

/// Heading titles of the trends page breakout blocks.
const EDUCATION_HEADING: &str = "学历要求";
const EXPERIENCE_HEADING: &str = "经验要求";

/// Selector for entity names on the directory page.
pub fn directory_names() -> Result<Selector, AppError> {
    parse_selector(DIRECTORY_NAMES)
}

/// Anchors of the salary-by-tenure summary sentence, e.g.
/// `…平均工资￥8000，其中1-3年工资￥6000，3-5年工资￥9000，…`.
pub fn tenure_rule() -> SliceRule {
    SliceRule::new("其中", "，", "，", "工资")
}

/// Stage A: the salary page.
pub fn salary_page() -> Result<PageExtractor, AppError> {
    PageExtractor::new()
        .with_name(Probe::attr("#jobKw", "value")?)
        .field(
            FieldId::AvgSalary,
            FieldSpec::Scalar(Probe::text(".salary-avger")?),
        )?
        .field(
            FieldId::SalaryByExperience,
            FieldSpec::Sliced {
                source: Probe::text("#workLen-dataInfoss")?,
                rule: tenure_rule(),
            },
        )?
        .field(
            FieldId::SalaryByCity,
            FieldSpec::Breakout(BreakoutSpec::new(
                ".fr ul li",
                Probe::text(".areaCont")?,
                Probe::text(".cfix .money")?,
            )?),
        )
}

/// Stage B: the employment trends page.
pub fn trends_page() -> Result<PageExtractor, AppError> {
    PageExtractor::new()
        .with_name(Probe::attr("#sweeper", "value")?)
        .field(
            FieldId::EducationDemand,
            FieldSpec::Breakout(demand_block(EDUCATION_HEADING)?),
        )?
        .field(
            FieldId::ExperienceDemand,
            FieldSpec::Breakout(demand_block(EXPERIENCE_HEADING)?),
        )?
        .field(
            FieldId::CityDemand,
            FieldSpec::Breakout(BreakoutSpec::new(
                ".modBar .br ol li",
                Probe::text(".barlist-title a")?,
                Probe::text(".barlist-value em")?,
            )?),
        )
}

fn demand_block(title: &str) -> Result<BreakoutSpec, AppError> {
    BreakoutSpec::new("li", Probe::attr("dfn", "title")?, Probe::text("em")?.last())?
        .within(".hori3p1", "h3", title)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Absence, Breakout, Extracted, Value};
    use crate::testutil::{salary_html, trends_html};

    fn breakout(pairs: &[(&str, &str)]) -> Extracted<Value> {
        let map: Breakout = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Extracted::Present(Value::Breakout(map))
    }

    #[test]
    fn salary_page_extracts_all_fields() {
        let html = salary_html(
            "销售经理",
            "￥8,000",
            "销售经理平均工资￥8,000，其中1-3年工资￥6,000，3-5年工资￥9,000，以上数据仅供参考",
            &[("北京", "￥10,000"), ("上海", "￥9,500")],
        );
        let page = salary_page().unwrap().extract_html(&html);

        assert_eq!(page.page_name.as_deref(), Some("销售经理"));
        assert_eq!(
            page.fields[&FieldId::AvgSalary],
            Extracted::Present(Value::Scalar("￥8,000".into()))
        );
        assert_eq!(
            page.fields[&FieldId::SalaryByExperience],
            breakout(&[("1-3年", "￥6,000"), ("3-5年", "￥9,000")])
        );
        assert_eq!(
            page.fields[&FieldId::SalaryByCity],
            breakout(&[("北京", "￥10,000"), ("上海", "￥9,500")])
        );
        assert!(!page.fields.contains_key(&FieldId::EducationDemand));
    }

    #[test]
    fn salary_page_tenure_without_anchors_affects_only_that_field() {
        let html = salary_html("销售经理", "￥8,000", "暂无数据", &[("北京", "￥10,000")]);
        let page = salary_page().unwrap().extract_html(&html);

        assert!(matches!(
            page.fields[&FieldId::SalaryByExperience],
            Extracted::Absent(Absence::Unparsable(_))
        ));
        assert!(page.fields[&FieldId::AvgSalary].is_present());
        assert!(page.fields[&FieldId::SalaryByCity].is_present());
    }

    #[test]
    fn trends_page_extracts_demand_blocks() {
        let html = trends_html(
            "销售经理",
            &[("本科", "70%"), ("大专", "25%")],
            &[("1-3年", "40%")],
            &[("深圳", "12%")],
        );
        let page = trends_page().unwrap().extract_html(&html);

        assert_eq!(page.page_name.as_deref(), Some("销售经理"));
        assert_eq!(
            page.fields[&FieldId::EducationDemand],
            breakout(&[("本科", "70%"), ("大专", "25%")])
        );
        assert_eq!(
            page.fields[&FieldId::ExperienceDemand],
            breakout(&[("1-3年", "40%")])
        );
        assert_eq!(
            page.fields[&FieldId::CityDemand],
            breakout(&[("深圳", "12%")])
        );
    }

    #[test]
    fn stages_own_disjoint_fields() {
        let salary = salary_page().unwrap();
        let trends = trends_page().unwrap();
        for field in FieldId::ALL {
            assert!(
                salary.owns(field) ^ trends.owns(field),
                "{field} must be owned by exactly one stage"
            );
        }
    }
}
