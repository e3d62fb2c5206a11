use std::io::Write;

use tempfile::NamedTempFile;

use retail_insights::aggregate;
use retail_insights::{ingest, FilterSelection, TableView};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut csv = NamedTempFile::new()?;
    write!(
        csv,
        "InvoiceNo,Description,Quantity,InvoiceDate,UnitPrice,Country\n\
         536365,WHITE HANGING HEART T-LIGHT HOLDER,6,12/1/2010 8:26,2.55,United Kingdom\n\
         536365,WHITE METAL LANTERN,6,12/1/2010 8:26,3.39,United Kingdom\n\
         536367,ASSORTED COLOUR BIRD ORNAMENT,32,12/1/2010 8:34,1.69,France\n\
         C536379,REGENCY CAKESTAND 3 TIER,-1,12/2/2010 9:41,12.75,United Kingdom\n\
         536520,JAM MAKING SET WITH JARS,4,1/14/2011 11:00,4.25,Germany\n"
    )?;

    let (table, report) = ingest(csv.path())?;
    println!(
        "ingested {} rows as {} ({} derived totals)",
        report.rows,
        report.encoding,
        if report.derived_total { "with" } else { "no" }
    );

    let all = TableView::all(&table);
    println!("total sales: {:.2}", aggregate::sum(&all, "TotalSales")?);
    println!(
        "orders: {}",
        aggregate::count_distinct(&all, "InvoiceNo")?
    );

    println!("\nsales by country:");
    for (country, total) in aggregate::sum_by(&all, "Country", "TotalSales")? {
        println!("{:<16} {:>8.2}", country, total);
    }

    println!("\nmonthly trend (UK only):");
    let uk = FilterSelection::new()
        .any_of("Country", ["United Kingdom"])
        .apply(&table)?;
    for (month, total) in aggregate::monthly_sum(&uk, "InvoiceDate", "TotalSales")? {
        println!("{} {:>8.2}", month, total);
    }
    Ok(())
}
